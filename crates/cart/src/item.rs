use serde::{Deserialize, Serialize};

use storefront_core::{Entity, Money, ProductId};

/// A line in the cart.
///
/// Invariant: `quantity >= 1`. A line whose quantity would drop below one is
/// removed instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: ProductId,
    pub name: String,
    /// Unit price in minor units.
    pub price: Money,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CartItem {
    /// `price × quantity`.
    pub fn line_total(&self) -> Money {
        self.price.times(self.quantity)
    }
}

impl Entity for CartItem {
    type Id = ProductId;

    fn id(&self) -> &ProductId {
        &self.id
    }
}

/// What the product page hands to "add to cart".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CartProduct {
    pub fn new(id: ProductId, name: impl Into<String>, price: Money) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            image_url: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// A fresh cart line for this product with quantity 1.
    pub fn into_item(self) -> CartItem {
        CartItem {
            id: self.id,
            name: self.name,
            price: self.price,
            quantity: 1,
            image_url: self.image_url,
        }
    }
}
