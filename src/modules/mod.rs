pub mod credit;
pub mod orders;
pub mod relay;
pub mod shop;
pub mod system;
pub mod topup;
pub mod voice;
