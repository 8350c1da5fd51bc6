pub mod cart;
pub mod order;
pub mod order_item;
pub mod product;
pub mod user;

// Re-export entities
pub use cart::{Entity as Cart, Model as CartModel};
pub use order::{Entity as Order, Model as OrderModel};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use user::{Entity as User, Model as UserModel};
