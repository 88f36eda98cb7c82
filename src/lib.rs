//! Almacen API Library
//!
//! Warehouse stock backend: the quant ledger, availability and reservation
//! arithmetic, weighted-average costing, lot/serial tracking, and the picking
//! state machine that orchestrates them.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;

/// Shared application state handed to every handler. The connection pool is
/// injected here by the composition root; no module owns a global handle.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub pickings: services::pickings::PickingService,
}

/// Common response wrapper for the HTTP surface.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}
