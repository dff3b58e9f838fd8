//! Cell list arithmetic.
//!
//! Throughout the topology an empty cell list means "every cell".

/// Check if `cell` is covered by `cells`
#[must_use]
pub fn in_cell_list(cell: &str, cells: &[String]) -> bool {
    cells.is_empty() || cells.iter().any(|c| c == cell)
}

/// Union of two cell lists, keeping the order of `left`.
///
/// If either side already covers every cell, so does the result.
#[must_use]
pub fn add_cells(left: &[String], right: &[String]) -> Vec<String> {
    if left.is_empty() || right.is_empty() {
        return Vec::new();
    }
    let mut merged = left.to_vec();
    for cell in right {
        if !merged.contains(cell) {
            merged.push(cell.clone());
        }
    }
    merged
}

/// Subtract `to_remove` from `cells`.
///
/// An empty `cells` stands for every cell and is expanded from `all_cells`
/// first. Returns the leftover cells and whether nothing is left.
#[must_use]
pub fn remove_cells(
    cells: &[String],
    to_remove: &[String],
    all_cells: &[String],
) -> (Vec<String>, bool) {
    let source = if cells.is_empty() { all_cells } else { cells };
    let leftover: Vec<String> = source
        .iter()
        .filter(|cell| !in_cell_list(cell, to_remove))
        .cloned()
        .collect();
    let empty = leftover.is_empty();
    (leftover, empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_in_cell_list() {
        assert!(in_cell_list("zone1", &[]));
        assert!(in_cell_list("zone1", &cells(&["zone1", "zone2"])));
        assert!(!in_cell_list("zone3", &cells(&["zone1", "zone2"])));
    }

    #[test]
    fn test_add_cells() {
        assert_eq!(
            add_cells(&cells(&["zone1"]), &cells(&["zone2", "zone1"])),
            cells(&["zone1", "zone2"])
        );
        assert!(add_cells(&[], &cells(&["zone1"])).is_empty());
        assert!(add_cells(&cells(&["zone1"]), &[]).is_empty());
    }

    #[test]
    fn test_remove_cells() {
        let all = cells(&["zone1", "zone2", "zone3"]);

        let (left, empty) = remove_cells(&cells(&["zone1", "zone2"]), &cells(&["zone1"]), &all);
        assert_eq!(left, cells(&["zone2"]));
        assert!(!empty);

        // empty list means all cells
        let (left, empty) = remove_cells(&[], &cells(&["zone2"]), &all);
        assert_eq!(left, cells(&["zone1", "zone3"]));
        assert!(!empty);

        let (left, empty) = remove_cells(&cells(&["zone1"]), &cells(&["zone1"]), &all);
        assert!(left.is_empty());
        assert!(empty);

        // removing with no cells named removes every cell
        let (_, empty) = remove_cells(&cells(&["zone1", "zone2"]), &[], &all);
        assert!(empty);
    }
}
