//! Natural multi-key ordering of the navigator forest.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

use crate::schema::Node;

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("digit-run pattern is valid"));

/// Sort every children list of the forest in place, roots included.
///
/// Sorting is stable; running it twice yields the same order.
pub fn sort_forest(nodes: &mut [Node]) {
    nodes.sort_by(compare_nodes);
    for node in nodes.iter_mut() {
        if let Some(children) = node.children_mut() {
            sort_forest(children);
        }
    }
}

/// Sibling comparator.
///
/// Sentinel buckets are pinned ("no manager" first, "no client" last), then
/// favorite projects precede the rest, then names compare by their first
/// digit run, then by natural order.
pub fn compare_nodes(a: &Node, b: &Node) -> Ordering {
    let pin = pin_rank(a).cmp(&pin_rank(b));
    if pin != Ordering::Equal {
        return pin;
    }

    if let (Node::Project(pa), Node::Project(pb)) = (a, b) {
        let fav = pb.is_favorite.cmp(&pa.is_favorite);
        if fav != Ordering::Equal {
            return fav;
        }
    }

    compare_names(a.name(), b.name())
}

fn pin_rank(node: &Node) -> i8 {
    match node {
        Node::Manager(_) if node.is_sentinel() => -1,
        Node::Client(_) if node.is_sentinel() => 1,
        _ => 0,
    }
}

/// Name ordering: first digit runs numerically, digit-bearing names first,
/// then natural order.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let run_a = DIGIT_RUN.find(a).map(|m| m.as_str());
    let run_b = DIGIT_RUN.find(b).map(|m| m.as_str());

    let by_run = match (run_a, run_b) {
        (Some(x), Some(y)) => compare_digit_runs(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_run.then_with(|| natural_cmp(a, b))
}

/// Numeric comparison of two ASCII digit strings of any length.
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Case-insensitive comparison treating digit runs as numbers, with a
/// case-sensitive tie-break so the order is total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut xs = a.chars().peekable();
    let mut ys = b.chars().peekable();

    loop {
        match (xs.peek().copied(), ys.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let nx = take_digits(&mut xs);
                let ny = take_digits(&mut ys);
                let ord = compare_digit_runs(&nx, &ny);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                xs.next();
                ys.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}
