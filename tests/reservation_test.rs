mod common;

use common::TestContext;
use rust_decimal_macros::dec;

use almacen_api::entities::product::{Ownership, Tracking};
use almacen_api::entities::stock_picking::PickingType;
use almacen_api::errors::ServiceError;
use almacen_api::services::availability;

#[tokio::test]
async fn reservation_blocks_competitors_before_commit() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("PERFIL C 80X40", Tracking::None, Ownership::Owned, dec!(0))
        .await;
    ctx.seed_stock(product.id, ctx.site.id, dec!(10), None, None)
        .await;

    // A reserves the full shelf without committing.
    let a = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Dispatch,
            Some(ctx.site.id),
            None,
            None,
            vec![common::line(product.id, dec!(10), None)],
        ))
        .await
        .expect("create A");
    ctx.pickings.mark_ready(a.id).await.expect("reserve A");

    // B loses the race: 10 physical - 10 reserved by A = 0 < 5.
    let b = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Dispatch,
            Some(ctx.site.id),
            None,
            None,
            vec![common::line(product.id, dec!(5), None)],
        ))
        .await
        .expect("create B");
    let err = ctx.pickings.mark_ready(b.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // The stock itself is untouched until A commits.
    assert_eq!(ctx.total_stock(product.id, ctx.site.id).await, dec!(10));
}

#[tokio::test]
async fn availability_report_tracks_reservations_and_incoming() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("PLANCHA OSB", Tracking::None, Ownership::Owned, dec!(0))
        .await;
    ctx.seed_stock(product.id, ctx.site.id, dec!(10), None, None)
        .await;

    let report = availability::get_availability(ctx.db.as_ref(), product.id, ctx.site.id, None)
        .await
        .expect("report");
    assert_eq!(report.physical, dec!(10));
    assert_eq!(report.reserved, dec!(0));
    assert_eq!(report.available, dec!(10));

    let dispatch = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Dispatch,
            Some(ctx.site.id),
            None,
            None,
            vec![common::line(product.id, dec!(4), None)],
        ))
        .await
        .expect("create dispatch");
    ctx.pickings.mark_ready(dispatch.id).await.expect("reserve");

    let receipt = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Receipt,
            None,
            Some(ctx.site.id),
            None,
            vec![common::line(product.id, dec!(7), None)],
        ))
        .await
        .expect("create receipt");
    ctx.pickings.mark_ready(receipt.id).await.expect("ready receipt");

    let report = availability::get_availability(ctx.db.as_ref(), product.id, ctx.site.id, None)
        .await
        .expect("report");
    assert_eq!(report.physical, dec!(10));
    assert_eq!(report.reserved, dec!(4));
    assert_eq!(report.incoming, dec!(7));
    // Incoming stock is reporting only; it never inflates availability.
    assert_eq!(report.available, dec!(6));
}

#[tokio::test]
async fn available_never_exceeds_physical_and_floors_at_zero() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("VIGA H 20", Tracking::None, Ownership::Owned, dec!(0))
        .await;
    ctx.seed_stock(product.id, ctx.site.id, dec!(3), None, None)
        .await;

    let dispatch = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Dispatch,
            Some(ctx.site.id),
            None,
            None,
            vec![common::line(product.id, dec!(3), None)],
        ))
        .await
        .expect("create dispatch");
    ctx.pickings.mark_ready(dispatch.id).await.expect("reserve");

    let report = availability::get_availability(ctx.db.as_ref(), product.id, ctx.site.id, None)
        .await
        .expect("report");
    assert!(report.available <= report.physical);
    assert_eq!(report.available, dec!(0));
}

#[tokio::test]
async fn check_stock_reports_shortage_lines() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("GEOTEXTIL", Tracking::None, Ownership::Owned, dec!(0))
        .await;
    ctx.seed_stock(product.id, ctx.site.id, dec!(2), None, None)
        .await;

    let picking = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Dispatch,
            Some(ctx.site.id),
            None,
            None,
            vec![common::line(product.id, dec!(9), None)],
        ))
        .await
        .expect("create dispatch");

    let check = ctx.pickings.check_stock(picking.id).await.expect("check");
    assert!(!check.ok);
    assert_eq!(check.shortages.len(), 1);
    let shortage = &check.shortages[0];
    assert_eq!(shortage.product_id, product.id);
    assert_eq!(shortage.location_id, ctx.site.id);
    assert_eq!(shortage.required, dec!(9));
    assert_eq!(shortage.available, dec!(2));
    assert!(check.message.contains("GEOTEXTIL"));
    assert!(check.message.contains(&picking.name));

    // A sufficient document reports clean.
    let ok = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Dispatch,
            Some(ctx.site.id),
            None,
            None,
            vec![common::line(product.id, dec!(2), None)],
        ))
        .await
        .expect("create small dispatch");
    let check = ctx.pickings.check_stock(ok.id).await.expect("check");
    assert!(check.ok);
    assert!(check.shortages.is_empty());
}

#[tokio::test]
async fn commit_revalidates_after_reservation() {
    let ctx = TestContext::new().await;
    let product = ctx
        .seed_product("ADITIVO PLAST", Tracking::None, Ownership::Owned, dec!(0))
        .await;
    ctx.seed_stock(product.id, ctx.site.id, dec!(5), None, None)
        .await;

    let dispatch = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Dispatch,
            Some(ctx.site.id),
            None,
            None,
            vec![common::line(product.id, dec!(5), None)],
        ))
        .await
        .expect("create dispatch");
    ctx.pickings.mark_ready(dispatch.id).await.expect("reserve");

    // Stock disappears between reservation and execution (e.g. a committed
    // adjustment); the second check inside the commit catches it.
    let shrink = ctx
        .pickings
        .create_picking(common::picking(
            PickingType::Adjustment,
            None,
            Some(ctx.site.id),
            None,
            vec![common::line(product.id, dec!(-4), None)],
        ))
        .await
        .expect("create shrink");
    ctx.pickings.mark_ready(shrink.id).await.expect("ready shrink");
    ctx.pickings
        .commit_picking(shrink.id, Default::default())
        .await
        .expect("commit shrink");

    let err = ctx
        .pickings
        .commit_picking(dispatch.id, Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // The failed commit rolled back completely.
    assert_eq!(ctx.total_stock(product.id, ctx.site.id).await, dec!(1));
    assert_eq!(ctx.picking_state(dispatch.id).await, "listo");
}
