use crate::database::Database;
use crate::modules::credit::database::CreditDatabase;
use crate::modules::orders::database::OrdersDatabase;
use crate::modules::shop::database::ShopDatabase;
use crate::modules::topup::database::TopupDatabase;
use crate::modules::voice::database::KeeperDatabase;

pub struct Databases {
    pub keeper: Database<KeeperDatabase>,
    pub credit: Database<CreditDatabase>,
    pub topup: Database<TopupDatabase>,
    pub shop: Database<ShopDatabase>,
    pub orders: Database<OrdersDatabase>,
}

impl Databases {
    pub async fn default() -> Result<Self, crate::database::DbError> {
        Ok(Self {
            keeper: Database::new("data/voice_keeper.json").await?,
            credit: Database::new("data/credit.json").await?,
            topup: Database::new("data/topup.json").await?,
            shop: Database::new("data/shop_status.json").await?,
            orders: Database::new("data/orders.json").await?,
        })
    }
}
