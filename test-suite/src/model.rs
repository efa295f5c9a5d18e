//! Reference model of `/Order` interpretation
//!
//! A direct recursive reading of the hierarchy rules over [`OrderItem`]s,
//! independent of the library's arena tree:
//!
//! * an array right after a layer reference holds that layer's children
//! * any other array is a group one level deeper with no parent layer
//! * a layer's display order is its depth-first rank starting at 1
//! * a layer listed twice takes the values of its last occurrence

use crate::generators::{LayeredPdfBuilder, OrderItem};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedPosition {
    pub depth: usize,
    pub parent: Option<u32>,
    pub display_order: usize,
}

/// Positions keyed by layer object number
pub fn expected_positions(items: &[OrderItem]) -> HashMap<u32, ExpectedPosition> {
    let mut out = HashMap::new();
    let mut counter = 0;
    walk(items, 0, None, &mut counter, &mut out);
    out
}

fn walk(
    items: &[OrderItem],
    depth: usize,
    parent: Option<u32>,
    counter: &mut usize,
    out: &mut HashMap<u32, ExpectedPosition>,
) {
    let mut previous: Option<u32> = None;
    for item in items {
        match item {
            OrderItem::Layer(index) => {
                let xref = LayeredPdfBuilder::layer_xref(*index);
                *counter += 1;
                out.insert(
                    xref,
                    ExpectedPosition {
                        depth,
                        parent,
                        display_order: *counter,
                    },
                );
                previous = Some(xref);
            }
            OrderItem::Array(nested) | OrderItem::Indirect(nested) => {
                walk(nested, depth + 1, previous.take(), counter, out)
            }
            OrderItem::Label(_) => previous = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn xref(index: usize) -> u32 {
        LayeredPdfBuilder::layer_xref(index)
    }

    #[test]
    fn test_children_and_groups() {
        let mut items: Vec<OrderItem> =
            OrderItem::with_children(0, vec![OrderItem::Layer(1)]).into();
        items.push(OrderItem::group("Print", vec![OrderItem::Layer(2)]));

        let positions = expected_positions(&items);
        assert_eq!(
            positions[&xref(1)],
            ExpectedPosition {
                depth: 1,
                parent: Some(xref(0)),
                display_order: 2
            }
        );
        assert_eq!(
            positions[&xref(2)],
            ExpectedPosition {
                depth: 1,
                parent: None,
                display_order: 3
            }
        );
    }

    #[test]
    fn test_second_array_is_a_group() {
        let items = vec![
            OrderItem::Layer(0),
            OrderItem::Array(vec![OrderItem::Layer(1)]),
            OrderItem::Array(vec![OrderItem::Layer(2)]),
        ];
        let positions = expected_positions(&items);
        assert_eq!(positions[&xref(1)].parent, Some(xref(0)));
        assert_eq!(positions[&xref(2)].parent, None);
    }
}
