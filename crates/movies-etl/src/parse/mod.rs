//! Aggregate traversal with visitor callbacks
//!
//! The walker knows how an extracted aggregate is shaped; the visitor knows
//! what to accumulate. Keeping those apart lets one traversal serve all three
//! entity kinds without branching on type inside the walk.

use serde_json::Value;

use crate::error::Result;
use crate::extract::{RawAggregate, RelatedKind};

/// Callbacks invoked while walking extracted aggregates
///
/// Per aggregate: `start_entity`, then `handle_related` once per nested
/// record in source order, then `end_entity`. All accumulation lives in the
/// implementation; the walker itself retains nothing between aggregates.
pub trait AggregateVisitor {
    fn start_entity(&mut self, aggregate: &RawAggregate) -> Result<()>;

    fn handle_related(&mut self, kind: RelatedKind, data: &Value) -> Result<()>;

    fn end_entity(&mut self) -> Result<()>;
}

/// Walk a batch of aggregates, dispatching into the visitor
pub fn walk_aggregates<V: AggregateVisitor>(
    aggregates: &[RawAggregate],
    visitor: &mut V,
) -> Result<()> {
    for aggregate in aggregates {
        visitor.start_entity(aggregate)?;
        for record in &aggregate.related {
            visitor.handle_related(record.kind, &record.data)?;
        }
        visitor.end_entity()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::RelatedRecord;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingVisitor {
        events: Vec<String>,
    }

    impl AggregateVisitor for RecordingVisitor {
        fn start_entity(&mut self, aggregate: &RawAggregate) -> Result<()> {
            self.events.push(format!("start {}", aggregate.id));
            Ok(())
        }

        fn handle_related(&mut self, kind: RelatedKind, data: &Value) -> Result<()> {
            self.events
                .push(format!("related {:?} {}", kind, data["name"]));
            Ok(())
        }

        fn end_entity(&mut self) -> Result<()> {
            self.events.push("end".to_string());
            Ok(())
        }
    }

    fn aggregate_with_related(related: Vec<RelatedRecord>) -> RawAggregate {
        RawAggregate {
            id: Uuid::new_v4(),
            modified: Utc::now(),
            fields: serde_json::Map::new(),
            related,
        }
    }

    #[test]
    fn test_callbacks_fire_in_source_order() {
        let aggregate = aggregate_with_related(vec![
            RelatedRecord {
                kind: RelatedKind::Genre,
                data: json!({"name": "Action"}),
            },
            RelatedRecord {
                kind: RelatedKind::Person,
                data: json!({"name": "Lee"}),
            },
        ]);

        let mut visitor = RecordingVisitor::default();
        walk_aggregates(std::slice::from_ref(&aggregate), &mut visitor).unwrap();

        assert_eq!(
            visitor.events,
            vec![
                format!("start {}", aggregate.id),
                "related Genre \"Action\"".to_string(),
                "related Person \"Lee\"".to_string(),
                "end".to_string(),
            ]
        );
    }

    #[test]
    fn test_each_aggregate_gets_its_own_bracket() {
        let first = aggregate_with_related(vec![]);
        let second = aggregate_with_related(vec![RelatedRecord {
            kind: RelatedKind::Film,
            data: json!({"name": "x"}),
        }]);

        let mut visitor = RecordingVisitor::default();
        walk_aggregates(&[first.clone(), second.clone()], &mut visitor).unwrap();

        assert_eq!(visitor.events.len(), 5);
        assert_eq!(visitor.events[0], format!("start {}", first.id));
        assert_eq!(visitor.events[1], "end");
        assert_eq!(visitor.events[2], format!("start {}", second.id));
        assert_eq!(visitor.events[4], "end");
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        let mut visitor = RecordingVisitor::default();
        walk_aggregates(&[], &mut visitor).unwrap();
        assert!(visitor.events.is_empty());
    }
}
