use divan::{Bencher, black_box};
use sqldelta::{ArgValue, Expr, ExprKind};

fn main() {
    divan::main();
}

/// `SELECT c0, c1, ... FROM t WHERE c0 = 0 AND c1 = 1 AND ...`
fn wide_query(columns: usize, filters: usize) -> Expr {
    let names: Vec<String> = (0..columns).map(|i| format!("c{i}")).collect();
    let filter = (0..filters)
        .map(|i| {
            Expr::binary(
                ExprKind::Eq,
                Expr::column(&names[i % columns]),
                Expr::number_literal(i as f64),
            )
        })
        .reduce(|acc, next| Expr::binary(ExprKind::And, acc, next));

    let mut query = Expr::select(names.iter().map(|name| Expr::column(name)).collect())
        .with_expr(
            "from",
            Expr::new(ExprKind::From).with_expr("this", Expr::table("t")),
        );
    if let Some(filter) = filter {
        query = query.with_expr("where", Expr::new(ExprKind::Where).with_expr("this", filter));
    }
    query
}

/// The same query with its column list rotated by one and one table renamed.
fn edited_query(columns: usize, filters: usize) -> Expr {
    let mut names: Vec<String> = (0..columns).map(|i| format!("c{i}")).collect();
    names.rotate_right(1);
    let query = wide_query(columns, filters);
    let mut edited = Expr::select(names.iter().map(|name| Expr::column(name)).collect())
        .with_expr(
            "from",
            Expr::new(ExprKind::From).with_expr("this", Expr::table("t_renamed")),
        );
    if let Some(ArgValue::Expr(filter)) = query.arg("where") {
        edited = edited.with_expr("where", (**filter).clone());
    }
    edited
}

#[divan::bench(args = [10, 100, 1000])]
fn diff_identical(bencher: Bencher, columns: usize) {
    let source = wide_query(columns, columns / 2);
    let target = source.clone();
    bencher.bench_local(|| {
        let changes = sqldelta::diff(black_box(&source), black_box(&target)).unwrap();
        black_box(changes);
    });
}

#[divan::bench(args = [10, 100, 1000])]
fn diff_edited(bencher: Bencher, columns: usize) {
    let source = wide_query(columns, columns / 2);
    let target = edited_query(columns, columns / 2);
    bencher.bench_local(|| {
        let changes = sqldelta::diff(black_box(&source), black_box(&target)).unwrap();
        black_box(changes);
    });
}

#[divan::bench(args = [10, 100, 500])]
fn diff_deep_filter(bencher: Bencher, filters: usize) {
    let source = wide_query(4, filters);
    let target = edited_query(4, filters);
    bencher.bench_local(|| {
        let changes = sqldelta::diff(black_box(&source), black_box(&target)).unwrap();
        black_box(changes);
    });
}
