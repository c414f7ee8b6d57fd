pub mod ai_provider;
pub mod ai_task;
pub mod coupon;
pub mod coupon_usage;
pub mod franchisee;
pub mod franchisee_deduction;
pub mod order;
pub mod order_event;
pub mod order_image;
pub mod printer_dispatch;
pub mod product;
pub mod product_size;
pub mod selection_token;
pub mod system_config;

pub use ai_provider::Entity as AiProvider;
pub use ai_task::Entity as AiTask;
pub use coupon::Entity as Coupon;
pub use coupon_usage::Entity as CouponUsage;
pub use franchisee::Entity as Franchisee;
pub use franchisee_deduction::Entity as FranchiseeDeduction;
pub use order::Entity as Order;
pub use order_event::Entity as OrderEvent;
pub use order_image::Entity as OrderImage;
pub use printer_dispatch::Entity as PrinterDispatch;
pub use product::Entity as Product;
pub use product_size::Entity as ProductSize;
pub use selection_token::Entity as SelectionToken;
pub use system_config::Entity as SystemConfig;
