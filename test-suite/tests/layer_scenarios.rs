//! Layer scenarios on hand-built and library-built documents

use pdfkiln::{AddLayerOptions, Placement, Session};
use pdfkiln_test_suite::generators::documents::{numbered_pages, parent_and_child};
use pdfkiln_test_suite::inspect::oc_arrays;
use pdfkiln_test_suite::{LayerSpec, LayeredPdfBuilder, OrderItem};
use pretty_assertions::assert_eq;

fn xref(index: usize) -> u32 {
    LayeredPdfBuilder::layer_xref(index)
}

#[test]
fn test_parent_child_scenario_through_api() {
    let session = Session::default();
    let mut doc = numbered_pages(&session, 1).unwrap();
    let (a, b) = parent_and_child(&mut doc).unwrap();

    let reopened = session.open(doc.to_bytes().unwrap()).unwrap();
    let layers = reopened.layers().unwrap();
    assert_eq!(layers.len(), 2);
    let (la, lb) = (&layers[0], &layers[1]);
    assert_eq!((la.xref, la.name.as_str(), la.depth, la.parent), (a, "A", 0, None));
    assert_eq!((lb.xref, lb.name.as_str(), lb.depth, lb.parent), (b, "B", 1, Some(a)));
    assert!(lb.display_order > la.display_order);
    assert!(la.on && lb.on);
}

#[test]
fn test_parent_child_scenario_from_file() {
    let pdf = LayeredPdfBuilder::new()
        .add_empty_page(612.0, 792.0)
        .add_layer(LayerSpec::new("A"))
        .add_layer(LayerSpec::new("B"))
        .with_order(OrderItem::with_children(0, vec![OrderItem::Layer(1)]).into())
        .build();
    let doc = Session::default().open(pdf).unwrap();
    let layers = doc.layers().unwrap();
    assert_eq!(layers[0].name, "A");
    assert_eq!((layers[0].depth, layers[0].parent, layers[0].display_order), (0, None, 1));
    assert_eq!(layers[1].name, "B");
    assert_eq!(
        (layers[1].depth, layers[1].parent, layers[1].display_order),
        (1, Some(xref(0)), 2)
    );
}

#[test]
fn test_fully_indirect_configuration() {
    let pdf = LayeredPdfBuilder::new()
        .add_empty_page(612.0, 792.0)
        .with_layers(4)
        .with_order(vec![
            OrderItem::Layer(0),
            OrderItem::Indirect(vec![
                OrderItem::Layer(1),
                OrderItem::Indirect(vec![OrderItem::Layer(2)]),
            ]),
            OrderItem::group("Print", vec![OrderItem::Layer(3)]),
        ])
        .with_indirect_properties()
        .with_indirect_config()
        .with_indirect_order()
        .build();
    let session = Session::default();
    let mut doc = session.open(pdf).unwrap();

    let summary: Vec<(String, usize, Option<u32>)> = doc
        .layers()
        .unwrap()
        .into_iter()
        .map(|l| (l.name, l.depth, l.parent))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("L0".to_string(), 0, None),
            ("L1".to_string(), 1, Some(xref(0))),
            ("L2".to_string(), 2, Some(xref(1))),
            ("L3".to_string(), 1, None),
        ]
    );

    let added = doc.add_layer("Under L2", &AddLayerOptions::under(xref(2))).unwrap();
    assert_eq!(added.placement, Placement::Nested { parent: xref(2) });
    let layers = doc.layers().unwrap();
    let child = layers.iter().find(|l| l.xref == added.xref).unwrap();
    assert_eq!((child.depth, child.parent), (3, Some(xref(2))));
}

#[test]
fn test_layers_outside_order_come_first() {
    let pdf = LayeredPdfBuilder::new()
        .add_empty_page(612.0, 792.0)
        .with_layers(3)
        .with_order(vec![OrderItem::Layer(2), OrderItem::Layer(0)])
        .build();
    let doc = Session::default().open(pdf).unwrap();
    let names: Vec<(String, usize)> = doc
        .layers()
        .unwrap()
        .into_iter()
        .map(|l| (l.name, l.display_order))
        .collect();
    assert_eq!(
        names,
        vec![
            ("L1".to_string(), 0),
            ("L2".to_string(), 1),
            ("L0".to_string(), 2)
        ]
    );
}

#[test]
fn test_malformed_order_still_lists_layers() {
    for order in ["42", "<< /Not /AnArray >>", "[99 0 R 3 0 R (x) [4 0 R]]", "[]"] {
        let pdf = LayeredPdfBuilder::new()
            .add_empty_page(612.0, 792.0)
            .with_layers(2)
            .with_raw_order(order)
            .build();
        let doc = Session::default().open(pdf).unwrap();
        let layers = doc.layers().unwrap();
        assert_eq!(layers.len(), 2, "order {order}");
        assert!(layers.iter().all(|l| l.parent.is_none()), "order {order}");
    }
}

#[test]
fn test_missing_parent_keeps_layer_at_root() {
    let pdf = LayeredPdfBuilder::new()
        .add_empty_page(612.0, 792.0)
        .with_layers(2)
        .with_order(vec![OrderItem::Layer(0)])
        .build();
    let session = Session::default();
    let mut doc = session.open(pdf).unwrap();

    // L1 exists but is not listed in /Order
    let added = doc.add_layer("Orphan", &AddLayerOptions::under(xref(1))).unwrap();
    assert_eq!(added.placement, Placement::ParentNotFound { parent: xref(1) });
    assert!(!added.is_nested());

    let raw = oc_arrays(&doc.to_bytes().unwrap()).unwrap();
    assert!(raw.order_root.iter().any(|id| id.0 == added.xref));

    let unknown = doc.add_layer("Nowhere", &AddLayerOptions::under(999)).unwrap();
    assert_eq!(unknown.placement, Placement::ParentNotFound { parent: 999 });
}

#[test]
fn test_visibility_and_locking_round_trip() {
    let pdf = LayeredPdfBuilder::new()
        .add_empty_page(612.0, 792.0)
        .add_layer(LayerSpec::new("Shown"))
        .add_layer(LayerSpec::new("Hidden").hidden().locked())
        .with_order(vec![OrderItem::Layer(0), OrderItem::Layer(1)])
        .build();
    let session = Session::default();
    let mut doc = session.open(pdf).unwrap();
    let flags: Vec<(bool, bool)> = doc.layers().unwrap().iter().map(|l| (l.on, l.locked)).collect();
    assert_eq!(flags, vec![(true, false), (false, true)]);

    doc.set_layer_visibility(xref(0), false).unwrap();
    doc.set_layer_visibility(xref(1), true).unwrap();
    doc.set_layer_visibility(xref(1), true).unwrap();
    doc.set_layer_locked(xref(1), false).unwrap();

    let bytes = doc.to_bytes().unwrap();
    let raw = oc_arrays(&bytes).unwrap();
    assert_eq!(raw.on.iter().filter(|id| id.0 == xref(1)).count(), 1);
    assert!(!raw.on.iter().any(|id| id.0 == xref(0)));
    assert!(raw.off.iter().any(|id| id.0 == xref(0)));
    assert!(!raw.off.iter().any(|id| id.0 == xref(1)));
    assert!(raw.locked.is_empty());

    let flags: Vec<(bool, bool)> = session
        .open(bytes)
        .unwrap()
        .layers()
        .unwrap()
        .iter()
        .map(|l| (l.on, l.locked))
        .collect();
    assert_eq!(flags, vec![(false, false), (true, false)]);
}

#[test]
fn test_delete_lifts_children() {
    let pdf = LayeredPdfBuilder::new()
        .add_empty_page(612.0, 792.0)
        .with_layers(3)
        .with_order(OrderItem::with_children(0, vec![OrderItem::Layer(1), OrderItem::Layer(2)]).into())
        .build();
    let session = Session::default();
    let mut doc = session.open(pdf).unwrap();
    doc.delete_layer(xref(0)).unwrap();

    let layers = doc.layers().unwrap();
    let summary: Vec<(String, usize, Option<u32>)> =
        layers.into_iter().map(|l| (l.name, l.depth, l.parent)).collect();
    assert_eq!(
        summary,
        vec![("L1".to_string(), 0, None), ("L2".to_string(), 0, None)]
    );
    assert!(doc.delete_layer(xref(0)).is_err());
}

#[test]
fn test_layers_with_duplicate_names_are_distinct() {
    let session = Session::default();
    let mut doc = numbered_pages(&session, 1).unwrap();
    let first = doc.add_layer("Same", &AddLayerOptions::default()).unwrap();
    let second = doc.add_layer("Same", &AddLayerOptions::under(first.xref).hidden()).unwrap();
    assert_ne!(first.xref, second.xref);

    let layers = doc.layers().unwrap();
    assert_eq!(layers[1].parent, Some(first.xref));
    assert!(!layers[1].on);
}
