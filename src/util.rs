// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::path::Path;

/// Extracts a displayable file name from a path, returning a fallback if the name is unreadable.
pub fn filename_display(path: &Path) -> &str {
    path.file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("unreadable file name")
}

/// Parses a comma separated list of MIDI notes, e.g. "36, 38,42".
pub fn parse_note_list(list: &str) -> Result<Vec<u8>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|note| !note.is_empty())
        .map(|note| {
            note.parse::<u8>()
                .ok()
                .filter(|n| *n <= 127)
                .ok_or_else(|| format!("invalid MIDI note: {}", note))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use crate::util::{filename_display, parse_note_list};

    #[test]
    fn test_filename_display() {
        assert_eq!("kick.wav", filename_display(Path::new("/samples/kick.wav")));
        assert_eq!("kick.wav", filename_display(Path::new("kick.wav")));
        assert_eq!("unreadable file name", filename_display(Path::new("/")));
    }

    #[test]
    fn test_parse_note_list() {
        assert_eq!(parse_note_list("36"), Ok(vec![36]));
        assert_eq!(parse_note_list("36, 38,42"), Ok(vec![36, 38, 42]));
        assert_eq!(parse_note_list(""), Ok(vec![]));
        assert!(parse_note_list("36,128").is_err());
        assert!(parse_note_list("kick").is_err());
    }
}
