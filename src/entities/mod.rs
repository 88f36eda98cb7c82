//! SeaORM entities for the stock engine tables.

pub mod document_sequence;
pub mod location;
pub mod product;
pub mod project;
pub mod stock_lot;
pub mod stock_move;
pub mod stock_move_line;
pub mod stock_picking;
pub mod stock_quant;
