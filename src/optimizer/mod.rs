use tracing::trace;

use crate::parser::ast::BinaryOp;
use crate::planner::{BoundExpr, InsertRows, Node, Plan, PlanNode};

/// Rewrites plans without changing their results.
#[derive(Debug, Default)]
pub struct Optimizer {}

impl Optimizer {
    pub fn new() -> Optimizer {
        Optimizer {}
    }

    pub fn optimize(&self, plan: Plan) -> Plan {
        match plan {
            Plan::Query(root) => Plan::Query(self.push_down_filters(root)),
            Plan::Insert {
                table,
                targets,
                rows: InsertRows::Query(root),
            } => Plan::Insert {
                table,
                targets,
                rows: InsertRows::Query(self.push_down_filters(root)),
            },
            plan => plan,
        }
    }

    /// Merges every `Filter` that sits directly on a `Scan` into the scan.
    fn push_down_filters(&self, plan: PlanNode) -> PlanNode {
        let PlanNode {
            output_schema,
            node,
        } = plan;

        let node = match node {
            Node::Filter { predicate, child } => {
                let child = self.push_down_filters(*child);
                match child.node {
                    Node::Scan { table, filter } => {
                        trace!(table, "pushing filter into scan");
                        Node::Scan {
                            table,
                            filter: Some(match filter {
                                Some(existing) => BoundExpr::Binary {
                                    left: Box::new(existing),
                                    op: BinaryOp::And,
                                    right: Box::new(predicate),
                                },
                                None => predicate,
                            }),
                        }
                    }
                    node => Node::Filter {
                        predicate,
                        child: Box::new(PlanNode {
                            output_schema: child.output_schema,
                            node,
                        }),
                    },
                }
            }
            Node::NestedLoopJoin {
                left,
                right,
                kind,
                predicate,
            } => Node::NestedLoopJoin {
                left: Box::new(self.push_down_filters(*left)),
                right: Box::new(self.push_down_filters(*right)),
                kind,
                predicate,
            },
            Node::Aggregation {
                group_by,
                aggregates,
                child,
            } => Node::Aggregation {
                group_by,
                aggregates,
                child: Box::new(self.push_down_filters(*child)),
            },
            Node::Projection { exprs, child } => Node::Projection {
                exprs,
                child: Box::new(self.push_down_filters(*child)),
            },
            Node::Distinct { width, child } => Node::Distinct {
                width,
                child: Box::new(self.push_down_filters(*child)),
            },
            Node::Sort { keys, child } => Node::Sort {
                keys,
                child: Box::new(self.push_down_filters(*child)),
            },
            Node::Limit {
                limit,
                offset,
                child,
            } => Node::Limit {
                limit,
                offset,
                child: Box::new(self.push_down_filters(*child)),
            },
            node @ (Node::Scan { .. } | Node::Empty) => node,
        };

        PlanNode {
            output_schema,
            node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::OutputSchema;
    use crate::types::Value;

    fn scan(filter: Option<BoundExpr>) -> PlanNode {
        PlanNode {
            output_schema: OutputSchema::default(),
            node: Node::Scan { table: 1, filter },
        }
    }

    fn filter(predicate: BoundExpr, child: PlanNode) -> PlanNode {
        PlanNode {
            output_schema: OutputSchema::default(),
            node: Node::Filter {
                predicate,
                child: Box::new(child),
            },
        }
    }

    #[test]
    fn filter_on_scan_is_merged() {
        let plan = filter(BoundExpr::Literal(Value::Integer(1)), scan(None));
        let Plan::Query(root) = Optimizer::new().optimize(Plan::Query(plan)) else {
            panic!("expected query");
        };
        assert!(matches!(root.node, Node::Scan { filter: Some(BoundExpr::Literal(_)), .. }));
    }

    #[test]
    fn stacked_filters_are_combined_with_and() {
        let plan = filter(
            BoundExpr::Column(0),
            filter(BoundExpr::Column(1), scan(None)),
        );
        let Plan::Query(root) = Optimizer::new().optimize(Plan::Query(plan)) else {
            panic!("expected query");
        };
        let Node::Scan {
            filter: Some(BoundExpr::Binary { op, .. }),
            ..
        } = root.node
        else {
            panic!("expected merged scan filter");
        };
        assert_eq!(op, BinaryOp::And);
    }

    #[test]
    fn filter_above_other_nodes_stays() {
        let plan = filter(
            BoundExpr::Column(0),
            PlanNode {
                output_schema: OutputSchema::default(),
                node: Node::Empty,
            },
        );
        let Plan::Query(root) = Optimizer::new().optimize(Plan::Query(plan)) else {
            panic!("expected query");
        };
        assert!(matches!(root.node, Node::Filter { .. }));
    }
}
