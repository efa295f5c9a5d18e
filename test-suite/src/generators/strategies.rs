//! Proptest strategies for `/Order` arrays

use super::OrderItem;
use proptest::prelude::*;

/// Item shape with unnumbered layers
fn item_shape() -> impl Strategy<Value = OrderItem> {
    let leaf = prop_oneof![
        6 => Just(OrderItem::Layer(0)),
        1 => "[A-Za-z ]{1,8}".prop_map(OrderItem::Label),
    ];
    leaf.prop_recursive(4, 64, 5, |inner| {
        prop_oneof![
            3 => prop::collection::vec(inner.clone(), 0..5).prop_map(OrderItem::Array),
            1 => prop::collection::vec(inner, 0..4).prop_map(OrderItem::Indirect),
        ]
    })
}

/// Give every layer placeholder the next index in writing order. Returns
/// the number of layers.
pub fn number_layers(items: &mut [OrderItem]) -> usize {
    fn visit(items: &mut [OrderItem], next: &mut usize) {
        for item in items {
            match item {
                OrderItem::Layer(index) => {
                    *index = *next;
                    *next += 1;
                }
                OrderItem::Array(nested) | OrderItem::Indirect(nested) => visit(nested, next),
                OrderItem::Label(_) => {}
            }
        }
    }
    let mut next = 0;
    visit(items, &mut next);
    next
}

/// A layer with children followed by a labelled group. Deleting the
/// children leaves the group right behind a bare reference.
fn layer_then_group() -> impl Strategy<Value = Vec<OrderItem>> {
    (
        prop::collection::vec(item_shape(), 1..3),
        "[A-Za-z]{1,8}",
        prop::collection::vec(item_shape(), 0..3),
    )
        .prop_map(|(children, label, members)| {
            let mut group = vec![OrderItem::Label(label)];
            group.extend(members);
            vec![
                OrderItem::Layer(0),
                OrderItem::Array(children),
                OrderItem::Array(group),
            ]
        })
}

/// An `/Order` array where every layer appears exactly once, with the
/// number of layers it references
pub fn order_array() -> impl Strategy<Value = (Vec<OrderItem>, usize)> {
    let run = prop_oneof![
        4 => item_shape().prop_map(|item| vec![item]),
        1 => layer_then_group(),
    ];
    prop::collection::vec(run, 0..8).prop_map(|runs| {
        let mut items: Vec<OrderItem> = runs.into_iter().flatten().collect();
        let count = number_layers(&mut items);
        (items, count)
    })
}

/// Layers used by `/Order` plus `extra` layers it never mentions
pub fn order_with_unlisted() -> impl Strategy<Value = (Vec<OrderItem>, usize, usize)> {
    (order_array(), 0usize..4).prop_map(|((items, listed), extra)| (items, listed, extra))
}

/// How the optional content configuration is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indirection {
    pub properties: bool,
    pub config: bool,
    pub order: bool,
}

pub fn indirection() -> impl Strategy<Value = Indirection> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(properties, config, order)| {
        Indirection {
            properties,
            config,
            order,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_number_layers_in_writing_order() {
        let mut items = vec![
            OrderItem::Layer(0),
            OrderItem::Array(vec![OrderItem::Layer(0), OrderItem::Label("x".into())]),
            OrderItem::Indirect(vec![OrderItem::Layer(0)]),
        ];
        assert_eq!(number_layers(&mut items), 3);
        assert_eq!(
            items,
            vec![
                OrderItem::Layer(0),
                OrderItem::Array(vec![OrderItem::Layer(1), OrderItem::Label("x".into())]),
                OrderItem::Indirect(vec![OrderItem::Layer(2)]),
            ]
        );
    }
}
