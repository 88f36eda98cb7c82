//! Test harness: a fresh in-memory SQLite database per context, migrated and
//! seeded with the standard location topology (one main-category warehouse,
//! one site bodega, and the three virtual endpoints).
#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tokio::sync::mpsc;

use almacen_api::db::{self, DbConfig};
use almacen_api::entities::location::{self, LocationUsage, MAIN_WAREHOUSE_CATEGORY};
use almacen_api::entities::product::{self, Entity as Product, Ownership, Tracking};
use almacen_api::entities::project;
use almacen_api::entities::stock_picking::{Entity as StockPicking, PickingType};
use almacen_api::entities::stock_quant;
use almacen_api::events::{self, EventSender};
use almacen_api::services::availability;
use almacen_api::services::ledger;
use almacen_api::services::pickings::{
    CommitTracking, MoveTracking, NewPicking, NewPickingLine, PickingService, TrackingLine,
};
use almacen_api::services::projects::LoggedProjectPhase;

pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub pickings: PickingService,
    /// Internal location in the main warehouse category; destinations here
    /// strip project tags.
    pub warehouse: location::Model,
    /// Internal site bodega outside the main category.
    pub site: location::Model,
    pub supplier: location::Model,
    pub customer: location::Model,
    pub loss: location::Model,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestContext {
    pub async fn new() -> Self {
        let cfg = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let pickings = PickingService::new(
            db.clone(),
            event_sender,
            Arc::new(LoggedProjectPhase),
            "1".to_string(),
        );

        let warehouse = seed_location(
            &db,
            "BODEGA CENTRAL",
            LocationUsage::Internal,
            Some(MAIN_WAREHOUSE_CATEGORY),
        )
        .await;
        let site = seed_location(&db, "BODEGA OBRA NORTE", LocationUsage::Internal, None).await;
        let supplier = seed_location(&db, "PROVEEDORES", LocationUsage::Supplier, None).await;
        let customer = seed_location(&db, "CLIENTES", LocationUsage::Customer, None).await;
        let loss = seed_location(
            &db,
            "PERDIDAS DE INVENTARIO",
            LocationUsage::InventoryLoss,
            None,
        )
        .await;

        Self {
            db,
            pickings,
            warehouse,
            site,
            supplier,
            customer,
            loss,
            _event_task: event_task,
        }
    }

    pub async fn seed_product(
        &self,
        name: &str,
        tracking: Tracking,
        ownership: Ownership,
        standard_price: Decimal,
    ) -> product::Model {
        let model = product::ActiveModel {
            name: Set(name.to_string()),
            default_code: Set(None),
            tracking: Set(tracking.as_str().to_string()),
            ownership: Set(ownership.as_str().to_string()),
            standard_price: Set(standard_price),
            active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        };
        model.insert(self.db.as_ref()).await.expect("seed product")
    }

    pub async fn seed_project(&self, name: &str) -> project::Model {
        let model = project::ActiveModel {
            name: Set(name.to_string()),
            code: Set(None),
            phase: Set("open".to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        };
        model.insert(self.db.as_ref()).await.expect("seed project")
    }

    /// Seeds stock through the ledger primitive itself.
    pub async fn seed_stock(
        &self,
        product_id: i64,
        location_id: i64,
        qty: Decimal,
        lot_id: Option<i64>,
        project_id: Option<i64>,
    ) {
        ledger::apply_quantity_delta(
            self.db.as_ref(),
            product_id,
            location_id,
            qty,
            lot_id,
            project_id,
        )
        .await
        .expect("seed stock");
    }

    /// Total physical quantity at (product, location), all lots/projects.
    pub async fn total_stock(&self, product_id: i64, location_id: i64) -> Decimal {
        availability::physical_quantity(self.db.as_ref(), product_id, location_id, None)
            .await
            .expect("physical quantity")
    }

    pub async fn quant(
        &self,
        product_id: i64,
        location_id: i64,
        lot_id: Option<i64>,
        project_id: Option<i64>,
    ) -> Option<stock_quant::Model> {
        ledger::find_quant(self.db.as_ref(), product_id, location_id, lot_id, project_id)
            .await
            .expect("find quant")
    }

    pub async fn product_price(&self, product_id: i64) -> Decimal {
        Product::find_by_id(product_id)
            .one(self.db.as_ref())
            .await
            .expect("load product")
            .expect("product exists")
            .standard_price
    }

    pub async fn picking_state(&self, picking_id: i64) -> String {
        StockPicking::find_by_id(picking_id)
            .one(self.db.as_ref())
            .await
            .expect("load picking")
            .expect("picking exists")
            .state
    }

    /// Id of the first (often only) move of a picking.
    pub async fn first_move_id(&self, picking_id: i64) -> i64 {
        let (_, moves) = self
            .pickings
            .get_picking(picking_id)
            .await
            .expect("load picking with moves");
        moves.first().expect("picking has moves").id
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

async fn seed_location(
    db: &DatabaseConnection,
    name: &str,
    usage: LocationUsage,
    category: Option<&str>,
) -> location::Model {
    let model = location::ActiveModel {
        name: Set(name.to_string()),
        usage: Set(usage.as_str().to_string()),
        category: Set(category.map(|c| c.to_string())),
        active: Set(true),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
        ..Default::default()
    };
    model.insert(db).await.expect("seed location")
}

/// Builds a picking input with the given endpoints and lines.
pub fn picking(
    picking_type: PickingType,
    location_id: Option<i64>,
    location_dest_id: Option<i64>,
    project_id: Option<i64>,
    lines: Vec<NewPickingLine>,
) -> NewPicking {
    NewPicking {
        picking_type,
        location_id,
        location_dest_id,
        partner_name: None,
        origin: None,
        project_id,
        notes: None,
        lines,
    }
}

pub fn line(product_id: i64, quantity: Decimal, price_unit: Option<Decimal>) -> NewPickingLine {
    NewPickingLine {
        product_id,
        quantity,
        price_unit,
        project_id: None,
    }
}

/// Tracking payload for a single move.
pub fn tracking(
    move_id: i64,
    quantity_done: Option<Decimal>,
    lots: &[(&str, Decimal)],
) -> CommitTracking {
    CommitTracking {
        moves: vec![MoveTracking {
            move_id,
            quantity_done,
            lots: lots
                .iter()
                .map(|(name, qty)| TrackingLine {
                    lot_name: name.to_string(),
                    qty: *qty,
                })
                .collect(),
        }],
    }
}
