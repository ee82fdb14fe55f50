use crate::{database::Database, default_struct};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifetime totals for one member in one guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopupEntry {
    pub amount: u64,
    pub count: u64,
}

default_struct! {
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupSettings {
    /// Role granted on a member's first top-up.
    pub customer_role: Option<u64>,
    /// Role granted once either threshold below is met.
    pub upgrade_role: Option<u64>,
    pub top1_role: Option<u64>,
    pub top5_role: Option<u64>,
    pub amount_threshold: u64 = 2000,
    pub count_threshold: u64 = 5,
}
}

impl TopupSettings {
    pub fn qualifies_for_upgrade(&self, entry: &TopupEntry) -> bool {
        entry.amount >= self.amount_threshold || entry.count >= self.count_threshold
    }
}

#[derive(Default, Serialize, Deserialize, Clone, Debug)]
pub struct TopupDatabase {
    pub accounts: HashMap<u64, HashMap<u64, TopupEntry>>,
    pub settings: HashMap<u64, TopupSettings>,
}

/// Leaderboard order: amount first, then count, then member id so equal
/// totals still render in a stable order.
pub fn sorted_entries(entries: &HashMap<u64, TopupEntry>) -> Vec<(u64, TopupEntry)> {
    let mut sorted: Vec<_> = entries
        .iter()
        .map(|(user_id, entry)| (*user_id, entry.clone()))
        .collect();
    sorted.sort_by(|a, b| {
        b.1.amount
            .cmp(&a.1.amount)
            .then(b.1.count.cmp(&a.1.count))
            .then(a.0.cmp(&b.0))
    });
    sorted
}

/// Who should hold the rank roles: the leader gets top-1, ranks two through
/// five get top-5.
pub fn rank_assignments(sorted: &[(u64, TopupEntry)]) -> (Option<u64>, Vec<u64>) {
    let top1 = sorted.first().map(|(user_id, _)| *user_id);
    let top5 = sorted
        .iter()
        .skip(1)
        .take(4)
        .map(|(user_id, _)| *user_id)
        .collect();
    (top1, top5)
}

impl Database<TopupDatabase> {
    pub async fn get_settings(&self, guild_id: u64) -> TopupSettings {
        self.read(|db| db.settings.get(&guild_id).cloned().unwrap_or_default())
            .await
    }

    pub async fn guild_accounts(&self, guild_id: u64) -> HashMap<u64, TopupEntry> {
        self.read(|db| db.accounts.get(&guild_id).cloned().unwrap_or_default())
            .await
    }

    pub async fn entry(&self, guild_id: u64, user_id: u64) -> Option<TopupEntry> {
        self.read(|db| {
            db.accounts
                .get(&guild_id)
                .and_then(|accounts| accounts.get(&user_id))
                .cloned()
        })
        .await
    }

    /// Books a top-up. Returns the new totals and whether this was the
    /// member's first one.
    pub async fn add_amount(
        &self,
        guild_id: u64,
        user_id: u64,
        amount: u64,
    ) -> Result<(TopupEntry, bool), String> {
        self.transaction(|db| {
            let accounts = db.accounts.entry(guild_id).or_default();
            let first_time = !accounts.contains_key(&user_id);
            let entry = accounts.entry(user_id).or_default();
            entry.amount = entry.amount.saturating_add(amount);
            entry.count += 1;
            Ok((entry.clone(), first_time))
        })
        .await
        .map_err(|e| e.to_string())
    }

    /// Overwrites totals directly; `None` keeps the current value.
    pub async fn set_totals(
        &self,
        guild_id: u64,
        user_id: u64,
        amount: Option<u64>,
        count: Option<u64>,
    ) -> Result<TopupEntry, String> {
        self.transaction(|db| {
            let entry = db
                .accounts
                .entry(guild_id)
                .or_default()
                .entry(user_id)
                .or_default();
            if let Some(amount) = amount {
                entry.amount = amount;
            }
            if let Some(count) = count {
                entry.count = count;
            }
            Ok(entry.clone())
        })
        .await
        .map_err(|e| e.to_string())
    }

    pub async fn remove_entry(&self, guild_id: u64, user_id: u64) -> Result<bool, String> {
        self.transaction(|db| {
            Ok(db
                .accounts
                .get_mut(&guild_id)
                .map(|accounts| accounts.remove(&user_id).is_some())
                .unwrap_or(false))
        })
        .await
        .map_err(|e| e.to_string())
    }

    /// Guild-wide `(amount, count, members)` sums.
    pub async fn guild_totals(&self, guild_id: u64) -> (u64, u64, usize) {
        self.read(|db| {
            db.accounts
                .get(&guild_id)
                .map(|accounts| {
                    let amount = accounts.values().map(|e| e.amount).sum();
                    let count = accounts.values().map(|e| e.count).sum();
                    (amount, count, accounts.len())
                })
                .unwrap_or((0, 0, 0))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(amount: u64, count: u64) -> TopupEntry {
        TopupEntry { amount, count }
    }

    #[test]
    fn sorting_breaks_ties_on_count_then_id() {
        let mut entries = HashMap::new();
        entries.insert(3, entry(500, 2));
        entries.insert(1, entry(900, 1));
        entries.insert(4, entry(500, 5));
        entries.insert(2, entry(500, 2));

        let sorted = sorted_entries(&entries);
        let order: Vec<u64> = sorted.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![1, 4, 2, 3]);
    }

    #[test]
    fn rank_assignments_split_leader_from_runners_up() {
        let sorted = vec![
            (10, entry(900, 1)),
            (11, entry(800, 1)),
            (12, entry(700, 1)),
            (13, entry(600, 1)),
            (14, entry(500, 1)),
            (15, entry(400, 1)),
        ];

        let (top1, top5) = rank_assignments(&sorted);
        assert_eq!(top1, Some(10));
        assert_eq!(top5, vec![11, 12, 13, 14]);
    }

    #[test]
    fn rank_assignments_handle_short_boards() {
        let (top1, top5) = rank_assignments(&[]);
        assert_eq!(top1, None);
        assert!(top5.is_empty());

        let sorted = vec![(10, entry(100, 1)), (11, entry(50, 1))];
        let (top1, top5) = rank_assignments(&sorted);
        assert_eq!(top1, Some(10));
        assert_eq!(top5, vec![11]);
    }

    #[test]
    fn upgrade_needs_either_threshold() {
        let settings = TopupSettings::default();
        assert_eq!(settings.amount_threshold, 2000);
        assert_eq!(settings.count_threshold, 5);

        assert!(settings.qualifies_for_upgrade(&entry(2000, 1)));
        assert!(settings.qualifies_for_upgrade(&entry(100, 5)));
        assert!(settings.qualifies_for_upgrade(&entry(3000, 9)));
        assert!(!settings.qualifies_for_upgrade(&entry(1999, 4)));
    }

    #[tokio::test]
    async fn first_topup_is_flagged_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topup.json");
        let db: Database<TopupDatabase> = Database::new(path.to_str().unwrap()).await.unwrap();

        let (totals, first) = db.add_amount(1, 7, 300).await.unwrap();
        assert!(first);
        assert_eq!(totals, entry(300, 1));

        let (totals, first) = db.add_amount(1, 7, 200).await.unwrap();
        assert!(!first);
        assert_eq!(totals, entry(500, 2));
    }

    #[tokio::test]
    async fn set_totals_keeps_unspecified_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topup.json");
        let db: Database<TopupDatabase> = Database::new(path.to_str().unwrap()).await.unwrap();

        db.add_amount(1, 7, 300).await.unwrap();
        let totals = db.set_totals(1, 7, Some(1000), None).await.unwrap();
        assert_eq!(totals, entry(1000, 1));

        let totals = db.set_totals(1, 7, None, Some(4)).await.unwrap();
        assert_eq!(totals, entry(1000, 4));
    }

    #[tokio::test]
    async fn totals_sum_the_whole_guild() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topup.json");
        let db: Database<TopupDatabase> = Database::new(path.to_str().unwrap()).await.unwrap();

        db.add_amount(1, 7, 300).await.unwrap();
        db.add_amount(1, 8, 200).await.unwrap();
        db.add_amount(1, 8, 100).await.unwrap();

        assert_eq!(db.guild_totals(1).await, (600, 3, 2));
        assert_eq!(db.guild_totals(2).await, (0, 0, 0));

        assert!(db.remove_entry(1, 8).await.unwrap());
        assert!(!db.remove_entry(1, 8).await.unwrap());
        assert_eq!(db.guild_totals(1).await, (300, 1, 1));
    }
}
