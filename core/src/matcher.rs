//! Row identity matching across datasets

use crate::dataset::{Dataset, Row, Value};
use log::debug;

/// Matches rows by the target's unique-key columns
pub struct RowMatcher;

impl RowMatcher {
    /// Index of the first target row whose unique-key values all equal `row`'s.
    ///
    /// A target without unique-key columns has no row identity, so nothing matches.
    pub fn find_match(row: &Row, target: &Dataset) -> Option<usize> {
        let keys = target.key_positions();
        if keys.is_empty() {
            return None;
        }
        target.rows().iter().position(|candidate| {
            keys.iter()
                .all(|&k| row.value(k).is_some() && row.value(k) == candidate.value(k))
        })
    }

    /// Copy of `row` ready to be inserted into `target`.
    ///
    /// When the row has no counterpart in `target`, columns that are both key and
    /// auto-generated are cleared so the store assigns a fresh value.
    pub fn prepare_for_insertion(row: &Row, target: &Dataset) -> Row {
        let mut values = row.values().to_vec();
        if Self::find_match(row, target).is_none() {
            for (i, column) in target.columns().iter().enumerate() {
                if column.is_generated_key() && i < values.len() {
                    debug!("Clearing generated key '{}' for insertion", column.name);
                    values[i] = Value::Null;
                }
            }
        }
        Row::added(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Column, ValueType};

    fn orders() -> Dataset {
        let mut dataset = Dataset::new(vec![
            Column::new("region", ValueType::Scalar).unique_key(),
            Column::new("number", ValueType::Scalar).unique_key(),
            Column::new("total", ValueType::Scalar),
        ])
        .unwrap();
        dataset.push_row(vec!["eu".into(), 1.into(), 10.into()]).unwrap();
        dataset.push_row(vec!["us".into(), 1.into(), 20.into()]).unwrap();
        dataset.push_row(vec!["eu".into(), 2.into(), 30.into()]).unwrap();
        dataset
    }

    fn users() -> Dataset {
        let mut dataset = Dataset::new(vec![
            Column::new("id", ValueType::Scalar).unique_key().auto_generated(),
            Column::new("email", ValueType::Scalar),
        ])
        .unwrap();
        dataset.push_row(vec![1.into(), "a@example.com".into()]).unwrap();
        dataset
    }

    #[test]
    fn test_composite_key_requires_all_columns() {
        let target = orders();

        let row = Row::new(vec!["us".into(), 1.into(), 999.into()]);
        assert_eq!(RowMatcher::find_match(&row, &target), Some(1));

        // Changing either key column breaks the match
        let row = Row::new(vec!["us".into(), 2.into(), 999.into()]);
        assert_eq!(RowMatcher::find_match(&row, &target), None);
        let row = Row::new(vec!["ap".into(), 1.into(), 999.into()]);
        assert_eq!(RowMatcher::find_match(&row, &target), None);
    }

    #[test]
    fn test_first_match_in_target_order() {
        let mut target = users();
        target.push_row(vec![1.into(), "dup@example.com".into()]).unwrap();

        let row = Row::new(vec![1.into(), "x".into()]);
        assert_eq!(RowMatcher::find_match(&row, &target), Some(0));
    }

    #[test]
    fn test_no_key_columns_never_match() {
        let mut target = Dataset::new(vec![Column::new("note", ValueType::Scalar)]).unwrap();
        target.push_row(vec!["same".into()]).unwrap();

        let row = Row::new(vec!["same".into()]);
        assert_eq!(RowMatcher::find_match(&row, &target), None);
    }

    #[test]
    fn test_prepare_clears_generated_key_when_not_found() {
        let target = users();
        let row = Row::new(vec![5.into(), "new@example.com".into()]);

        let prepared = RowMatcher::prepare_for_insertion(&row, &target);
        assert_eq!(prepared.value(0), Some(&Value::Null));
        assert_eq!(prepared.value(1), Some(&Value::from("new@example.com")));
        // The input row is left alone
        assert_eq!(row.value(0), Some(&Value::from(5)));
    }

    #[test]
    fn test_prepare_keeps_key_when_matched() {
        let target = users();
        let row = Row::new(vec![1.into(), "changed@example.com".into()]);

        let prepared = RowMatcher::prepare_for_insertion(&row, &target);
        assert_eq!(prepared.value(0), Some(&Value::from(1)));
    }

    #[test]
    fn test_prepare_keeps_plain_key_when_not_found() {
        // Keys the store does not generate are inserted as given
        let target = orders();
        let row = Row::new(vec!["ap".into(), 9.into(), 1.into()]);

        let prepared = RowMatcher::prepare_for_insertion(&row, &target);
        assert_eq!(prepared.values(), row.values());
    }
}
