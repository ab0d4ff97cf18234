//! Read-side view models for the cart and order screens: product joins
//! flattened into serializable shapes, with product-less lines dropped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::cart::{Cart, CartId, CartLine, CartLineId};
use crate::domain::order::{Order, OrderItem};
use crate::domain::product::ProductId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineView {
    pub line_id: CartLineId,
    pub product_id: ProductId,
    pub name: String,
    pub brand: String,
    pub image_url: Option<String>,
    pub unit_price: i64,
    pub quantity: u32,
    pub line_subtotal: i64,
    pub selected_options: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    pub cart_id: CartId,
    pub lines: Vec<CartLineView>,
    pub subtotal: i64,
}

impl CartView {
    /// Lines whose product lookup failed are filtered out before any
    /// pricing is shown, mirroring what settlement does.
    pub fn assemble(cart: &Cart, lines: Vec<CartLine>) -> Self {
        let lines: Vec<CartLineView> = lines
            .into_iter()
            .filter_map(|line| {
                let product = line.product.as_ref()?;
                Some(CartLineView {
                    line_id: line.id.clone(),
                    product_id: line.product_id.clone(),
                    name: product.name.clone(),
                    brand: product.brand.clone(),
                    image_url: product.image_url.clone(),
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                    line_subtotal: line.line_subtotal(),
                    selected_options: line.selected_options.clone(),
                })
            })
            .collect();
        let subtotal = lines.iter().map(|line| line.line_subtotal).sum();
        Self { cart_id: cart.id.clone(), lines, subtotal }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub order: Order,
    pub items: Vec<OrderItem>,
}
