use compositor_protocol::{IntPoint, LayerId, SizeF, VectorF};
use layer_tree::{LayerImpl, LayerTreeImpl, LayerTreeKind, ViewportLayers};

use super::*;

const ROOT: LayerId = LayerId(1);
const INNER_CONTAINER: LayerId = LayerId(2);
const INNER_SCROLL: LayerId = LayerId(3);
const PAGE_SCALE: LayerId = LayerId(4);
const OUTER_CONTAINER: LayerId = LayerId(5);
const OUTER_SCROLL: LayerId = LayerId(6);

fn layer(id: LayerId, width: f32, height: f32) -> LayerImpl {
    let mut layer = LayerImpl::new(id);
    layer.bounds = SizeF::new(width, height);
    layer
}

fn viewport_tree(viewport: f32, content_height: f32) -> LayerTreeImpl {
    let mut tree = LayerTreeImpl::new(LayerTreeKind::Active);
    tree.set_root_layer(layer(ROOT, viewport, viewport));
    tree.add_child(ROOT, layer(INNER_CONTAINER, viewport, viewport))
        .expect("inner container");
    let mut inner = layer(INNER_SCROLL, viewport, viewport);
    inner.scroll_clip_layer = Some(INNER_CONTAINER);
    tree.add_child(INNER_CONTAINER, inner).expect("inner scroll");
    tree.add_child(INNER_SCROLL, LayerImpl::new(PAGE_SCALE))
        .expect("page scale");
    tree.add_child(PAGE_SCALE, layer(OUTER_CONTAINER, viewport, viewport))
        .expect("outer container");
    let mut outer = layer(OUTER_SCROLL, viewport, content_height);
    outer.scroll_clip_layer = Some(OUTER_CONTAINER);
    tree.add_child(OUTER_CONTAINER, outer).expect("outer scroll");
    tree.set_viewport_layers(ViewportLayers {
        page_scale: Some(PAGE_SCALE),
        inner_viewport_scroll: Some(INNER_SCROLL),
        outer_viewport_scroll: Some(OUTER_SCROLL),
    });
    tree.push_page_scale_from_main_thread(1.0, 0.5, 4.0);
    tree
}

fn wheel(
    viewport: &mut Viewport,
    tree: &mut LayerTreeImpl,
    top_controls: &mut TopControlsManager,
    delta: VectorF,
) -> ScrollResult {
    viewport.scroll_by(tree, top_controls, delta, IntPoint::new(10, 10), false, true)
}

#[test]
fn unscrollable_inner_viewport_bubbles_to_outer() {
    let mut tree = viewport_tree(100.0, 300.0);
    let mut top_controls = TopControlsManager::new(0.5, 0.5);
    let mut viewport = Viewport::new();

    let result = wheel(&mut viewport, &mut tree, &mut top_controls, VectorF::new(0.0, 50.0));

    assert_eq!(result.consumed_delta, VectorF::new(0.0, 50.0));
    assert_eq!(result.content_scrolled_delta, VectorF::new(0.0, 50.0));
    assert_eq!(tree.current_scroll_offset(OUTER_SCROLL), VectorF::new(0.0, 50.0));
    assert_eq!(tree.current_scroll_offset(INNER_SCROLL), VectorF::zero());
}

#[test]
fn overscroll_is_the_part_no_viewport_consumed() {
    let mut tree = viewport_tree(100.0, 150.0);
    let mut top_controls = TopControlsManager::new(0.5, 0.5);
    let mut viewport = Viewport::new();
    let delta = VectorF::new(0.0, 80.0);

    let result = wheel(&mut viewport, &mut tree, &mut top_controls, delta);

    assert_eq!(result.consumed_delta, VectorF::new(0.0, 50.0));
    let unconsumed = delta - result.consumed_delta;
    assert!((unconsumed.y + tree.total_scroll_offset().y - delta.y).abs() < SCROLL_EPSILON);
}

#[test]
fn remainder_below_epsilon_counts_as_consumed() {
    let mut tree = viewport_tree(100.0, 150.0);
    let mut top_controls = TopControlsManager::new(0.5, 0.5);
    let mut viewport = Viewport::new();
    let delta = VectorF::new(0.0, 50.05);

    let result = wheel(&mut viewport, &mut tree, &mut top_controls, delta);

    assert_eq!(result.consumed_delta, delta);
}

#[test]
fn top_controls_take_the_scroll_before_content() {
    let mut tree = viewport_tree(100.0, 300.0);
    tree.set_top_controls_height(50.0, true);
    let mut top_controls = TopControlsManager::new(0.5, 0.5);
    top_controls.scroll_begin(&tree);
    let mut viewport = Viewport::new();

    let result = wheel(&mut viewport, &mut tree, &mut top_controls, VectorF::new(0.0, 30.0));

    assert_eq!(result.consumed_delta, VectorF::new(0.0, 30.0));
    assert_eq!(result.content_scrolled_delta, VectorF::zero());
    assert!((tree.current_top_controls_shown_ratio() - 0.4).abs() < 1e-4);
    assert_eq!(tree.total_scroll_offset(), VectorF::zero());
}

#[test]
fn wheel_scroll_without_top_controls_leaves_ratio_alone() {
    let mut tree = viewport_tree(100.0, 300.0);
    tree.set_top_controls_height(50.0, true);
    let mut top_controls = TopControlsManager::new(0.5, 0.5);
    let mut viewport = Viewport::new();

    let result = viewport.scroll_by(
        &mut tree,
        &mut top_controls,
        VectorF::new(0.0, 30.0),
        IntPoint::new(10, 10),
        false,
        false,
    );

    assert_eq!(result.content_scrolled_delta, VectorF::new(0.0, 30.0));
    assert_eq!(tree.current_top_controls_shown_ratio(), 1.0);
}

#[test]
fn pinch_keeps_the_anchor_over_the_same_content() {
    let mut tree = viewport_tree(400.0, 800.0);
    let mut viewport = Viewport::new();
    let anchor = IntPoint::new(200, 200);

    viewport.pinch_update(&mut tree, 2.0, anchor);

    assert!((tree.current_page_scale_factor() - 2.0).abs() < 1e-4);
    assert_eq!(viewport.pinch_anchor_adjustment(), VectorF::zero());
    let offset = tree.total_scroll_offset();
    let content_under_anchor = offset + VectorF::new(200.0, 200.0) / 2.0;
    assert!((content_under_anchor.x - 200.0).abs() < 1e-3);
    assert!((content_under_anchor.y - 200.0).abs() < 1e-3);
    // The outer viewport cannot scroll horizontally, so the inner one took x.
    assert_eq!(tree.current_scroll_offset(INNER_SCROLL), VectorF::new(100.0, 0.0));
    assert_eq!(tree.current_scroll_offset(OUTER_SCROLL), VectorF::new(0.0, 100.0));
}

#[test]
fn pinch_near_an_edge_snaps_the_anchor() {
    let mut tree = viewport_tree(400.0, 800.0);
    let mut viewport = Viewport::new();

    viewport.pinch_update(&mut tree, 2.0, IntPoint::new(10, 200));
    assert_eq!(viewport.pinch_anchor_adjustment(), VectorF::new(-10.0, 0.0));
    assert_eq!(tree.total_scroll_offset().x, 0.0);

    // Later updates in the same gesture keep the first adjustment.
    viewport.pinch_update(&mut tree, 1.0, IntPoint::new(200, 200));
    assert_eq!(viewport.pinch_anchor_adjustment(), VectorF::new(-10.0, 0.0));

    viewport.pinch_end();
    assert!(!viewport.pinch_zoom_active());
    assert_eq!(viewport.pinch_anchor_adjustment(), VectorF::zero());
}

#[test]
fn outer_first_scroll_bubbles_to_inner() {
    let mut tree = viewport_tree(400.0, 800.0);
    tree.set_page_scale_on_active_tree(2.0);

    let unused = Viewport::scroll_outer_first(&mut tree, VectorF::new(0.0, 700.0));

    assert_eq!(unused, VectorF::new(0.0, 100.0));
    assert_eq!(tree.current_scroll_offset(OUTER_SCROLL), VectorF::new(0.0, 400.0));
    assert_eq!(tree.current_scroll_offset(INNER_SCROLL), VectorF::new(0.0, 200.0));
}

#[test]
fn inner_first_scroll_bubbles_to_outer() {
    let mut tree = viewport_tree(400.0, 800.0);
    tree.set_page_scale_on_active_tree(2.0);

    let unused = Viewport::scroll_inner_first(&mut tree, VectorF::new(0.0, 300.0));

    assert_eq!(unused, VectorF::zero());
    assert_eq!(tree.current_scroll_offset(INNER_SCROLL), VectorF::new(0.0, 200.0));
    assert_eq!(tree.current_scroll_offset(OUTER_SCROLL), VectorF::new(0.0, 100.0));
}
