//! Column letters and cell addresses
//!
//! Columns are zero-based internally; letters ("A", "AB") and column
//! numbers (1-based) are the user-facing forms.

/// Zero-based column index to its letter form (0 -> "A", 27 -> "AB")
pub fn column_letter(index: u32) -> String {
    let mut n = index as u64 + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Letter form to zero-based column index, case-insensitive
pub fn column_index(letters: &str) -> Option<u32> {
    let letters = letters.trim();
    if letters.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        n = n * 26 + (c.to_ascii_uppercase() as u64 - 'A' as u64 + 1);
        if n > u32::MAX as u64 {
            return None;
        }
    }
    Some((n - 1) as u32)
}

/// Spreadsheet-style address for a 1-based row and zero-based column ("C14")
pub fn cell_address(row: u32, column: u32) -> String {
    format!("{}{}", column_letter(column), row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A"), Some(0));
        assert_eq!(column_index("b"), Some(1));
        assert_eq!(column_index("AA"), Some(26));
        assert_eq!(column_index("zz"), Some(701));
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("A1"), None);
    }

    #[test]
    fn test_letter_index_agree() {
        for index in [0, 1, 25, 26, 51, 52, 700, 16383] {
            assert_eq!(column_index(&column_letter(index)), Some(index));
        }
    }

    #[test]
    fn test_cell_address() {
        assert_eq!(cell_address(14, 2), "C14");
        assert_eq!(cell_address(1, 26), "AA1");
    }
}
