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

/// The file name of a path for log output.
pub fn filename_display(path: &Path) -> &str {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("<unnamed>")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_filename_display() {
        assert_eq!(filename_display(Path::new("/loops/takes/take.wav")), "take.wav");
        assert_eq!(filename_display(Path::new("bounce.wav")), "bounce.wav");
        assert_eq!(filename_display(Path::new("/")), "<unnamed>");
    }
}
