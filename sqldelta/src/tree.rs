//! Building banksia trees from expressions.
//!
//! Every expression node becomes one arena node. Its banksia value is its
//! argument layout plus its primitive arguments; its children are its child
//! expressions in argument order, with list arguments expanded in place, each
//! placed in the slot named after its argument. Each arena node is labeled
//! with the expression it came from, so edit operations can be mapped back
//! to borrowed nodes.

use core::marker::PhantomData;

use banksia::indextree::NodeId;
use banksia::{NodeData, Tree, TreeTypes};
use smallvec::SmallVec;

use crate::error::DiffError;
use crate::expr::{ArgValue, Expr, ExprKind, Slot, Value};
use crate::trace;

/// Tree types for expression trees borrowed for `'a`.
pub struct ExprTypes<'a>(PhantomData<&'a Expr>);

/// What an argument holds, without its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgShape {
    /// A primitive value
    Value,
    /// One child expression
    Expr,
    /// A list of child expressions, possibly empty
    List,
}

/// A node's own content: which arguments it has, and its primitive values.
///
/// List lengths are left out, so inserting into a list doesn't change the
/// node holding it. Which slot each child sits in is recorded on the child
/// as its edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodeValue<'a> {
    /// Every argument, by name, in argument order
    pub layout: SmallVec<[(&'static str, ArgShape); 4]>,
    /// Primitive arguments, by name, in argument order
    pub primitives: SmallVec<[(&'static str, &'a Value); 2]>,
}

impl<'a> NodeValue<'a> {
    fn of(expr: &'a Expr) -> Self {
        let layout = expr
            .args
            .iter()
            .map(|arg| {
                let shape = match &arg.value {
                    ArgValue::Value(_) => ArgShape::Value,
                    ArgValue::Expr(_) => ArgShape::Expr,
                    ArgValue::List(_) => ArgShape::List,
                };
                (arg.name, shape)
            })
            .collect();
        Self {
            layout,
            primitives: expr.values().collect(),
        }
    }
}

impl<'a> TreeTypes for ExprTypes<'a> {
    type Kind = ExprKind;
    type Value = NodeValue<'a>;
    type Label = &'a Expr;
    type Edge = &'static str;
}

/// An arena tree over a borrowed expression.
pub type ExprTree<'a> = Tree<ExprTypes<'a>>;

/// Validate `root` and build its finalized banksia tree.
///
/// Walks with an explicit stack, so deeply nested expressions can't
/// overflow the call stack.
pub fn build_tree(root: &Expr) -> Result<ExprTree<'_>, DiffError> {
    validate(root)?;
    let mut tree: ExprTree<'_> = Tree::new(node_data(root));

    let mut stack: Vec<(NodeId, &'static str, &Expr)> = Vec::new();
    push_children(&mut stack, tree.root, root);

    while let Some((parent, slot, expr)) = stack.pop() {
        validate(expr)?;
        let id = tree.add_child(parent, node_data(expr).in_slot(slot));
        push_children(&mut stack, id, expr);
    }

    tree.finalize();
    trace!(
        nodes = banksia::DiffTree::node_count(&tree),
        root = %root.kind,
        "built expression tree"
    );
    Ok(tree)
}

fn node_data(expr: &Expr) -> NodeData<ExprTypes<'_>> {
    NodeData::new(expr.kind, NodeValue::of(expr), expr)
}

/// Push children reversed, so they pop (and get appended) in order.
fn push_children<'a>(
    stack: &mut Vec<(NodeId, &'static str, &'a Expr)>,
    parent: NodeId,
    expr: &'a Expr,
) {
    let first = stack.len();
    for arg in &expr.args {
        let children: &[Expr] = match &arg.value {
            ArgValue::Expr(child) => core::slice::from_ref(&**child),
            ArgValue::List(children) => children,
            ArgValue::Value(_) => &[],
        };
        stack.extend(children.iter().map(|child| (parent, arg.name, child)));
    }
    stack[first..].reverse();
}

/// Check one node's arguments against its kind's schema.
pub fn validate(expr: &Expr) -> Result<(), DiffError> {
    let kind = expr.kind;
    let error_fields = |slot: &str| (kind.to_string(), slot.to_string());

    for (i, arg) in expr.args.iter().enumerate() {
        let Some(arg_type) = kind.arg_type(arg.name) else {
            let (kind, slot) = error_fields(arg.name);
            return Err(DiffError::UnknownArg { kind, slot });
        };
        if expr.args[..i].iter().any(|earlier| earlier.name == arg.name) {
            let (kind, slot) = error_fields(arg.name);
            return Err(DiffError::DuplicateArg { kind, slot });
        }
        match &arg.value {
            ArgValue::Expr(_) | ArgValue::List(_) if kind.is_leaf() => {
                let (kind, slot) = error_fields(arg.name);
                return Err(DiffError::LeafWithChildren { kind, slot });
            }
            ArgValue::List(_) if arg_type.slot == Slot::Single => {
                let (kind, slot) = error_fields(arg.name);
                return Err(DiffError::ListInScalarSlot { kind, slot });
            }
            _ => {}
        }
    }

    if let Some(missing) = kind
        .arg_types()
        .iter()
        .find(|arg_type| arg_type.required && expr.arg(arg_type.name).is_none())
    {
        let (kind, slot) = error_fields(missing.name);
        return Err(DiffError::MissingArg { kind, slot });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::JoinSide;
    use banksia::{DiffTree, NodeHash};
    use facet_testhelpers::test;
    use std::collections::{HashMap, HashSet};

    #[test]
    fn test_tree_mirrors_expression() {
        // SELECT a + b
        let expr = Expr::select(vec![Expr::binary(
            ExprKind::Add,
            Expr::column("a"),
            Expr::column("b"),
        )]);
        let tree = build_tree(&expr).unwrap();

        assert_eq!(tree.node_count(), expr.node_count());
        let walked: Vec<&Expr> = expr.walk().collect();
        let labels: Vec<&Expr> = tree.iter().map(|id| *tree.label(id)).collect();
        assert_eq!(labels.len(), walked.len());
        for (label, node) in labels.iter().zip(&walked) {
            assert!(core::ptr::eq(*label, *node));
        }
    }

    #[test]
    fn test_node_value_is_layout_and_primitive_args() {
        let expr = Expr::identifier("a");
        let tree = build_tree(&expr).unwrap();

        let value = tree.value(tree.root);
        assert_eq!(
            value.layout.as_slice(),
            &[("this", ArgShape::Value), ("quoted", ArgShape::Value)]
        );
        assert_eq!(
            value.primitives.as_slice(),
            &[
                ("this", &Value::Text("a".into())),
                ("quoted", &Value::Bool(false))
            ]
        );
    }

    #[test]
    fn test_children_sit_in_their_argument_slots() {
        // FROM s.t AS u
        let table = Expr::table("t")
            .with_expr("db", Expr::identifier("s"))
            .with_expr("alias", Expr::identifier("u"));
        let tree = build_tree(&table).unwrap();

        let edges: Vec<&str> = tree.children(tree.root).map(|id| *tree.edge(id)).collect();
        assert_eq!(edges, vec!["this", "db", "alias"]);
        assert_eq!(*tree.edge(tree.root), "");
        assert_eq!(
            tree.value(tree.root).layout.as_slice(),
            &[
                ("this", ArgShape::Expr),
                ("db", ArgShape::Expr),
                ("alias", ArgShape::Expr)
            ]
        );
    }

    #[test]
    fn test_equal_subtrees_share_fingerprints() {
        let expr = Expr::binary(ExprKind::Eq, Expr::column("k"), Expr::column("k"));
        let tree = build_tree(&expr).unwrap();

        let sides: Vec<_> = tree.children(tree.root).collect();
        assert_eq!(tree.hash(sides[0]), tree.hash(sides[1]));
        assert_ne!(tree.hash(sides[0]), tree.hash(tree.root));
    }

    /// Structurally different expressions built from the same few names,
    /// mostly differing in which slot a child sits in.
    fn variants() -> Vec<Expr> {
        let names = ["s", "t"];
        let mut out = Vec::new();

        for name in names {
            out.push(Expr::identifier(name));
            out.push(Expr::string_literal(name));
            out.push(Expr::column(name));
            for table in names {
                out.push(Expr::qualified_column(table, name));
            }
        }
        out.push(Expr::number_literal(1.0));
        out.push(Expr::string_literal("1"));

        // tables with every combination of db and alias
        let optional = [None, Some("s"), Some("t")];
        for this in names {
            for db in optional {
                for alias in optional {
                    let mut table = Expr::table(this);
                    if let Some(db) = db {
                        table = table.with_expr("db", Expr::identifier(db));
                    }
                    if let Some(alias) = alias {
                        table = table.with_expr("alias", Expr::identifier(alias));
                    }
                    out.push(table);
                }
            }
        }

        // joins on, using, both, and neither, for two sides
        for side in [JoinSide::Inner, JoinSide::Left] {
            for (on, using) in [(false, false), (true, false), (false, true), (true, true)] {
                let mut join = Expr::new(ExprKind::Join(side)).with_expr("this", Expr::table("t"));
                if on {
                    join = join.with_expr("on", Expr::column("k"));
                }
                if using {
                    join = join.with_list("using", vec![Expr::column("k")]);
                }
                out.push(join);
            }
            out.push(
                Expr::new(ExprKind::Join(side))
                    .with_expr("this", Expr::table("t"))
                    .with_list("using", vec![]),
            );
        }

        // operands in either slot
        for kind in [ExprKind::Add, ExprKind::Eq, ExprKind::And] {
            for (left, right) in [("s", "t"), ("t", "s"), ("s", "s")] {
                out.push(Expr::binary(kind, Expr::column(left), Expr::column(right)));
            }
        }

        // the same children split differently across list and single slots
        let columns = || [Expr::column("s"), Expr::column("t"), Expr::column("u")];
        for split in 0..=3 {
            let all = columns();
            let (partition, rest) = all.split_at(split);
            let mut window = Expr::new(ExprKind::Window)
                .with_expr("this", Expr::new(ExprKind::RowNumber))
                .with_list("partition_by", partition.to_vec());
            if let Some(order) = rest.first() {
                window = window.with_expr("order", order.clone());
            }
            out.push(window);
        }
        for split in 0..=2 {
            let all = columns();
            let (this, expressions) = all.split_at(1);
            let call = Expr::new(ExprKind::Anonymous)
                .with_expr("this", this[0].clone())
                .with_list("expressions", expressions[..split].to_vec());
            out.push(call);
        }

        // clauses present or absent
        let filter = || Expr::new(ExprKind::Where).with_expr("this", Expr::column("s"));
        let from = || Expr::new(ExprKind::From).with_expr("this", Expr::table("t"));
        out.push(Expr::select(vec![Expr::column("s")]));
        out.push(Expr::select(vec![Expr::column("s")]).with_expr("where", filter()));
        out.push(Expr::select(vec![Expr::column("s")]).with_expr("from", from()));
        out.push(
            Expr::select(vec![Expr::column("s")])
                .with_expr("from", from())
                .with_expr("where", filter()),
        );
        out.push(
            Expr::select(vec![Expr::column("s")])
                .with_expr("where", filter())
                .with_expr("from", from()),
        );
        out.push(Expr::select(vec![Expr::column("s")]).with_list("joins", vec![]));

        out
    }

    #[test]
    fn test_distinct_expressions_have_distinct_fingerprints() {
        let variants = variants();
        let mut seen: HashMap<NodeHash, &Expr> = HashMap::new();
        let mut distinct = 0;

        for expr in &variants {
            let tree = build_tree(expr).unwrap();
            match seen.insert(tree.hash(tree.root), expr) {
                None => distinct += 1,
                Some(previous) => assert_eq!(
                    previous, expr,
                    "{previous} and {expr} share a fingerprint"
                ),
            }
        }

        let unique: HashSet<&Expr> = variants.iter().collect();
        assert_eq!(distinct, unique.len());
    }

    #[test]
    fn test_leaf_with_children_is_rejected() {
        let expr = Expr::select(vec![
            Expr::new(ExprKind::Identifier)
                .with_value("this", "a")
                .with_expr("quoted", Expr::column("b")),
        ]);
        let err = build_tree(&expr).err().unwrap();
        assert_eq!(
            err,
            DiffError::LeafWithChildren {
                kind: "Identifier".into(),
                slot: "quoted".into()
            }
        );
    }

    #[test]
    fn test_schema_violations_are_rejected() {
        let unknown = Expr::column("a").with_value("collation", "C");
        assert!(matches!(
            validate(&unknown),
            Err(DiffError::UnknownArg { .. })
        ));

        let duplicate = Expr::column("a").with_expr("this", Expr::identifier("b"));
        assert!(matches!(
            validate(&duplicate),
            Err(DiffError::DuplicateArg { .. })
        ));

        let missing = Expr::new(ExprKind::Alias).with_expr("this", Expr::column("a"));
        assert_eq!(
            validate(&missing),
            Err(DiffError::MissingArg {
                kind: "Alias".into(),
                slot: "alias".into()
            })
        );

        let list = Expr::new(ExprKind::Where).with_list("this", vec![Expr::column("a")]);
        assert!(matches!(
            validate(&list),
            Err(DiffError::ListInScalarSlot { .. })
        ));
    }
}
