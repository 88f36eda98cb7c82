mod common;

use common::TestContext;
use rust_decimal_macros::dec;

use almacen_api::entities::product::{Ownership, Tracking};
use almacen_api::entities::stock_picking::PickingType;
use almacen_api::errors::ServiceError;
use almacen_api::services::pickings::{CommitTracking, TransitionOutcome};

#[tokio::test]
async fn simple_receipt_commits_stock_and_cost() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("CEMENTO 25KG", Tracking::None, Ownership::Owned, dec!(0))
        .await;

    let picking = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Receipt,
            None,
            Some(ctx.warehouse.id),
            None,
            vec![common::line(product.id, dec!(10), Some(dec!(5.00)))],
        ))
        .await
        .expect("create receipt");

    assert_eq!(picking.state, "draft");
    assert!(picking.name.starts_with("C1/IN/"));

    let outcome = ctx.pickings.mark_ready(picking.id).await.expect("reserve");
    assert_eq!(outcome, TransitionOutcome::Applied);

    let outcome = ctx
        .pickings
        .commit_picking(picking.id, CommitTracking::default())
        .await
        .expect("commit");
    assert_eq!(outcome, TransitionOutcome::Applied);

    assert_eq!(ctx.total_stock(product.id, ctx.warehouse.id).await, dec!(10));
    assert_eq!(ctx.product_price(product.id).await, dec!(5.00));
    assert_eq!(ctx.picking_state(picking.id).await, "done");
}

#[tokio::test]
async fn document_numbers_are_dense_per_prefix() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("ARENA M3", Tracking::None, Ownership::Owned, dec!(0))
        .await;

    let first = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Receipt,
            None,
            Some(ctx.warehouse.id),
            None,
            vec![common::line(product.id, dec!(1), None)],
        ))
        .await
        .expect("first receipt");
    let second = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Receipt,
            None,
            Some(ctx.warehouse.id),
            None,
            vec![common::line(product.id, dec!(1), None)],
        ))
        .await
        .expect("second receipt");

    assert_eq!(first.name, "C1/IN/00001");
    assert_eq!(second.name, "C1/IN/00002");
}

#[tokio::test]
async fn oversell_is_rejected_at_reservation() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("FIERRO 12MM", Tracking::None, Ownership::Owned, dec!(0))
        .await;
    ctx.seed_stock(product.id, ctx.site.id, dec!(5), None, None)
        .await;

    let picking = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Dispatch,
            Some(ctx.site.id),
            None,
            None,
            vec![common::line(product.id, dec!(8), None)],
        ))
        .await
        .expect("create dispatch");

    let err = ctx.pickings.mark_ready(picking.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // Nothing moved, nothing reserved.
    assert_eq!(ctx.total_stock(product.id, ctx.site.id).await, dec!(5));
    assert_eq!(ctx.picking_state(picking.id).await, "draft");
}

#[tokio::test]
async fn commit_is_idempotent() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("LADRILLO", Tracking::None, Ownership::Owned, dec!(0))
        .await;

    let picking = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Receipt,
            None,
            Some(ctx.warehouse.id),
            None,
            vec![common::line(product.id, dec!(10), Some(dec!(2.00)))],
        ))
        .await
        .expect("create receipt");
    ctx.pickings.mark_ready(picking.id).await.expect("reserve");

    let first = ctx
        .pickings
        .commit_picking(picking.id, CommitTracking::default())
        .await
        .expect("first commit");
    assert_eq!(first, TransitionOutcome::Applied);

    // A retried commit observes the advanced state and mutates nothing.
    let second = ctx
        .pickings
        .commit_picking(picking.id, CommitTracking::default())
        .await
        .expect("second commit");
    assert_eq!(second, TransitionOutcome::AlreadyInState);

    assert_eq!(ctx.total_stock(product.id, ctx.warehouse.id).await, dec!(10));
}

#[tokio::test]
async fn empty_document_cannot_be_reserved() {
    let ctx = TestContext::new().await;

    let picking = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Receipt,
            None,
            Some(ctx.warehouse.id),
            None,
            vec![],
        ))
        .await
        .expect("create empty receipt");

    let err = ctx.pickings.mark_ready(picking.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::EmptyDocument(_)));
}

#[tokio::test]
async fn negative_adjustment_validates_against_physical() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("CLAVOS 2IN", Tracking::None, Ownership::Owned, dec!(0))
        .await;
    ctx.seed_stock(product.id, ctx.site.id, dec!(3), None, None)
        .await;

    // Removing 5 from a shelf holding 3 is rejected.
    let too_much = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Adjustment,
            None,
            Some(ctx.site.id),
            None,
            vec![common::line(product.id, dec!(-5), None)],
        ))
        .await
        .expect("create adjustment");
    let err = ctx.pickings.mark_ready(too_much.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));
    assert_eq!(ctx.total_stock(product.id, ctx.site.id).await, dec!(3));

    // Removing 2 succeeds and leaves 1.
    let ok = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Adjustment,
            None,
            Some(ctx.site.id),
            None,
            vec![common::line(product.id, dec!(-2), None)],
        ))
        .await
        .expect("create adjustment");
    ctx.pickings.mark_ready(ok.id).await.expect("reserve");
    ctx.pickings
        .commit_picking(ok.id, CommitTracking::default())
        .await
        .expect("commit");
    assert_eq!(ctx.total_stock(product.id, ctx.site.id).await, dec!(1));
}

#[tokio::test]
async fn internal_transfer_conserves_total_stock() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("TUBO PVC", Tracking::None, Ownership::Owned, dec!(0))
        .await;
    ctx.seed_stock(product.id, ctx.site.id, dec!(10), None, None)
        .await;

    let picking = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Transfer,
            Some(ctx.site.id),
            Some(ctx.warehouse.id),
            None,
            vec![common::line(product.id, dec!(4), None)],
        ))
        .await
        .expect("create transfer");
    ctx.pickings.mark_ready(picking.id).await.expect("reserve");
    ctx.pickings
        .commit_picking(picking.id, CommitTracking::default())
        .await
        .expect("commit");

    assert_eq!(ctx.total_stock(product.id, ctx.site.id).await, dec!(6));
    assert_eq!(ctx.total_stock(product.id, ctx.warehouse.id).await, dec!(4));
}

#[tokio::test]
async fn cancel_releases_reservation_implicitly() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("MALLA ACMA", Tracking::None, Ownership::Owned, dec!(0))
        .await;
    ctx.seed_stock(product.id, ctx.site.id, dec!(10), None, None)
        .await;

    let blocker = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Dispatch,
            Some(ctx.site.id),
            None,
            None,
            vec![common::line(product.id, dec!(10), None)],
        ))
        .await
        .expect("create blocker");
    ctx.pickings.mark_ready(blocker.id).await.expect("reserve");

    let competitor = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Dispatch,
            Some(ctx.site.id),
            None,
            None,
            vec![common::line(product.id, dec!(5), None)],
        ))
        .await
        .expect("create competitor");
    let err = ctx.pickings.mark_ready(competitor.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    let outcome = ctx
        .pickings
        .cancel_picking(blocker.id)
        .await
        .expect("cancel blocker");
    assert_eq!(outcome, TransitionOutcome::Applied);

    // Cancelling again is an idempotent success.
    let outcome = ctx
        .pickings
        .cancel_picking(blocker.id)
        .await
        .expect("cancel again");
    assert_eq!(outcome, TransitionOutcome::AlreadyInState);

    // The competitor can now take the stock.
    ctx.pickings
        .mark_ready(competitor.id)
        .await
        .expect("reserve competitor");
}

#[tokio::test]
async fn return_to_draft_releases_reservation() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("PINTURA 1GL", Tracking::None, Ownership::Owned, dec!(0))
        .await;
    ctx.seed_stock(product.id, ctx.site.id, dec!(6), None, None)
        .await;

    let picking = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Dispatch,
            Some(ctx.site.id),
            None,
            None,
            vec![common::line(product.id, dec!(6), None)],
        ))
        .await
        .expect("create dispatch");
    ctx.pickings.mark_ready(picking.id).await.expect("reserve");
    assert_eq!(ctx.picking_state(picking.id).await, "listo");

    let outcome = ctx
        .pickings
        .return_to_draft(picking.id)
        .await
        .expect("return to draft");
    assert_eq!(outcome, TransitionOutcome::Applied);
    assert_eq!(ctx.picking_state(picking.id).await, "draft");

    let outcome = ctx
        .pickings
        .return_to_draft(picking.id)
        .await
        .expect("return again");
    assert_eq!(outcome, TransitionOutcome::AlreadyInState);

    // The released quantity is reservable by another document.
    let other = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Dispatch,
            Some(ctx.site.id),
            None,
            None,
            vec![common::line(product.id, dec!(6), None)],
        ))
        .await
        .expect("create other");
    ctx.pickings.mark_ready(other.id).await.expect("reserve other");
}

#[tokio::test]
async fn illegal_transitions_are_rejected() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("YESO 25KG", Tracking::None, Ownership::Owned, dec!(0))
        .await;

    let picking = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Receipt,
            None,
            Some(ctx.warehouse.id),
            None,
            vec![common::line(product.id, dec!(2), None)],
        ))
        .await
        .expect("create receipt");

    // Draft documents cannot be committed directly.
    let err = ctx
        .pickings
        .commit_picking(picking.id, CommitTracking::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidStatus(_)));

    ctx.pickings.mark_ready(picking.id).await.expect("reserve");
    ctx.pickings
        .commit_picking(picking.id, CommitTracking::default())
        .await
        .expect("commit");

    // Committed history cannot be cancelled or reopened.
    let err = ctx.pickings.cancel_picking(picking.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidStatus(_)));
    let err = ctx.pickings.return_to_draft(picking.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidStatus(_)));

    // Cancelled documents cannot be confirmed.
    let cancelled = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Receipt,
            None,
            Some(ctx.warehouse.id),
            None,
            vec![common::line(product.id, dec!(1), None)],
        ))
        .await
        .expect("create second receipt");
    ctx.pickings
        .cancel_picking(cancelled.id)
        .await
        .expect("cancel");
    let err = ctx
        .pickings
        .commit_picking(cancelled.id, CommitTracking::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidStatus(_)));
}

#[tokio::test]
async fn only_drafts_can_be_deleted() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("SACO ESCOMBRO", Tracking::None, Ownership::Owned, dec!(0))
        .await;
    ctx.seed_stock(product.id, ctx.site.id, dec!(4), None, None)
        .await;

    let draft = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Dispatch,
            Some(ctx.site.id),
            None,
            None,
            vec![common::line(product.id, dec!(1), None)],
        ))
        .await
        .expect("create draft");
    ctx.pickings
        .delete_picking(draft.id)
        .await
        .expect("delete draft");
    let err = ctx.pickings.get_picking(draft.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let reserved = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Dispatch,
            Some(ctx.site.id),
            None,
            None,
            vec![common::line(product.id, dec!(1), None)],
        ))
        .await
        .expect("create reserved");
    ctx.pickings.mark_ready(reserved.id).await.expect("reserve");
    let err = ctx.pickings.delete_picking(reserved.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidStatus(_)));
}

#[tokio::test]
async fn dispatch_prefers_project_stock_then_general() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("CERAMICA 45X45", Tracking::None, Ownership::Owned, dec!(0))
        .await;
    let project = ctx.seed_project("OBRA NORTE").await;

    ctx.seed_stock(product.id, ctx.site.id, dec!(6), None, None)
        .await;
    ctx.seed_stock(product.id, ctx.site.id, dec!(4), None, Some(project.id))
        .await;

    let picking = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Dispatch,
            Some(ctx.site.id),
            None,
            Some(project.id),
            vec![common::line(product.id, dec!(8), None)],
        ))
        .await
        .expect("create dispatch");
    ctx.pickings.mark_ready(picking.id).await.expect("reserve");
    ctx.pickings
        .commit_picking(picking.id, CommitTracking::default())
        .await
        .expect("commit");

    // Project stock goes first; the remainder is borrowed from general.
    assert!(ctx
        .quant(product.id, ctx.site.id, None, Some(project.id))
        .await
        .is_none());
    let general = ctx
        .quant(product.id, ctx.site.id, None, None)
        .await
        .expect("general quant remains");
    assert_eq!(general.quantity, dec!(2));
}

#[tokio::test]
async fn main_warehouse_destination_strips_project_tag() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("ZINC 0.35", Tracking::None, Ownership::Owned, dec!(0))
        .await;
    let project = ctx.seed_project("OBRA SUR").await;
    ctx.seed_stock(product.id, ctx.site.id, dec!(5), None, Some(project.id))
        .await;

    let picking = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Transfer,
            Some(ctx.site.id),
            Some(ctx.warehouse.id),
            Some(project.id),
            vec![common::line(product.id, dec!(5), None)],
        ))
        .await
        .expect("create transfer");
    ctx.pickings.mark_ready(picking.id).await.expect("reserve");
    ctx.pickings
        .commit_picking(picking.id, CommitTracking::default())
        .await
        .expect("commit");

    // Material returning to general stock loses its project tag.
    assert!(ctx
        .quant(product.id, ctx.site.id, None, Some(project.id))
        .await
        .is_none());
    let general = ctx
        .quant(product.id, ctx.warehouse.id, None, None)
        .await
        .expect("untagged quant at main warehouse");
    assert_eq!(general.quantity, dec!(5));
    assert!(ctx
        .quant(product.id, ctx.warehouse.id, None, Some(project.id))
        .await
        .is_none());
}
