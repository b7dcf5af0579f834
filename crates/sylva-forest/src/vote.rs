//! Majority voting with first-seen tie-breaking.

/// Return the most frequent label, or `None` for an empty input.
///
/// Labels are grouped in the order they are first encountered. The group
/// with the highest count wins; among equal counts the group seen first
/// wins, which is not necessarily the smallest label.
pub fn majority<I>(labels: I) -> Option<usize>
where
    I: IntoIterator<Item = usize>,
{
    let mut groups: Vec<(usize, usize)> = Vec::new();
    for label in labels {
        match groups.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => groups.push((label, 1)),
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for (label, count) in groups {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label)
}

#[cfg(test)]
mod tests {
    use super::majority;

    #[test]
    fn empty_has_no_majority() {
        assert_eq!(majority(std::iter::empty()), None);
    }

    #[test]
    fn clear_winner() {
        assert_eq!(majority([0, 1, 1]), Some(1));
    }

    #[test]
    fn tie_goes_to_first_seen() {
        assert_eq!(majority([2, 0, 0, 2]), Some(2));
        assert_eq!(majority([0, 2, 2, 0]), Some(0));
    }

    #[test]
    fn later_group_needs_strictly_more_votes() {
        assert_eq!(majority([3, 1, 1, 3, 1]), Some(1));
    }

    #[test]
    fn single_vote() {
        assert_eq!(majority([4]), Some(4));
    }
}
