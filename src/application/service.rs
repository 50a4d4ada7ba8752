use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::domain::{
    Bill, Cents, Friend, Settlement, net_balance, others_balances, pair_key, to_cents,
};
use crate::storage::Repository;

use super::{AppError, BalanceOverview, FriendOverview, OthersSummary};

/// How a new bill's amount should be divided, with the per-participant
/// shares where the split is not equal. Exact shares are decimal currency
/// units, percentage shares are percent values.
pub enum SplitSpec {
    Equal,
    Exact(HashMap<String, f64>),
    Percentage(HashMap<String, f64>),
}

/// Application service providing high-level operations for the ledger.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
///
/// Balances are derived state: every overview is recomputed from the full
/// bill and settlement history. A fingerprint over the serialized inputs
/// lets repeated calls with unchanged data reuse the previous result.
pub struct SplitService {
    repo: Repository,
    owner: String,
    overview_cache: Mutex<HashMap<String, (u64, FriendOverview)>>,
}

impl SplitService {
    /// Create a new service over the given repository, reconciling from the
    /// perspective of `owner`.
    pub fn new(repo: Repository, owner: impl Into<String>) -> Self {
        Self {
            repo,
            owner: owner.into(),
            overview_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str, owner: impl Into<String>) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo, owner))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, owner: impl Into<String>) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo, owner))
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    // ========================
    // Friend operations
    // ========================

    /// Add a friend to the roster.
    pub async fn add_friend(&self, name: &str) -> Result<Friend, AppError> {
        let friends = self.repo.load_friends(&self.owner).await?;
        if friends.iter().any(|f| f.name == name) {
            return Err(AppError::FriendAlreadyExists(name.to_string()));
        }

        let friend = Friend::new(name);
        self.repo.append_friend(&self.owner, &friend).await?;
        Ok(friend)
    }

    /// Get a friend from the roster by name.
    pub async fn get_friend(&self, name: &str) -> Result<Friend, AppError> {
        self.repo
            .load_friends(&self.owner)
            .await?
            .into_iter()
            .find(|f| f.name == name)
            .ok_or_else(|| AppError::FriendNotFound(name.to_string()))
    }

    /// List the friend roster.
    pub async fn list_friends(&self) -> Result<Vec<Friend>, AppError> {
        Ok(self.repo.load_friends(&self.owner).await?)
    }

    // ========================
    // Bill operations
    // ========================

    /// Record a new bill.
    ///
    /// The creation boundary is where split consistency is enforced: exact
    /// shares must sum to the bill total and percentage shares to 100
    /// (within one cent / 0.01). The engine itself accepts inconsistent
    /// historical records silently.
    pub async fn record_bill(
        &self,
        payer: Option<&str>,
        amount_cents: Cents,
        split_with: Vec<String>,
        split: SplitSpec,
        date: DateTime<Utc>,
        currency: Option<String>,
        description: Option<String>,
    ) -> Result<Bill, AppError> {
        if amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let participants: Vec<String> = split_with
            .into_iter()
            .filter(|p| seen.insert(p.clone()))
            .collect();
        if participants.is_empty() {
            return Err(AppError::EmptySplit);
        }

        let payer = payer.unwrap_or(self.owner.as_str());
        let mut bill = Bill::new(payer, amount_cents, participants.clone(), date);

        match split {
            SplitSpec::Equal => {}
            SplitSpec::Exact(shares) => {
                validate_share_names(&shares, &participants)?;
                let actual: Cents = shares.values().map(|units| to_cents(*units)).sum();
                if (actual - amount_cents).abs() > 1 {
                    return Err(AppError::ExactSplitMismatch {
                        expected: amount_cents,
                        actual,
                    });
                }
                bill = bill.with_exact_split(shares);
            }
            SplitSpec::Percentage(shares) => {
                validate_share_names(&shares, &participants)?;
                let actual: f64 = shares.values().sum();
                if (actual - 100.0).abs() > 0.01 {
                    return Err(AppError::PercentageSplitMismatch { actual });
                }
                bill = bill.with_percentage_split(shares);
            }
        }

        if let Some(currency) = currency {
            bill = bill.with_currency(currency);
        }
        if let Some(desc) = description {
            bill = bill.with_description(desc);
        }

        self.repo.append_bill(&self.owner, &bill).await?;
        self.invalidate_overviews();
        Ok(bill)
    }

    /// List every recorded bill.
    pub async fn bills(&self) -> Result<Vec<Bill>, AppError> {
        Ok(self.repo.load_bills(&self.owner).await?)
    }

    // ========================
    // Settlement operations
    // ========================

    /// Record a direct payment between two people. New records always carry
    /// a direction tag when the account owner is involved.
    pub async fn record_settlement(
        &self,
        payer: &str,
        receiver: &str,
        amount_cents: Cents,
        date: DateTime<Utc>,
        note: Option<String>,
    ) -> Result<Settlement, AppError> {
        if amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let mut settlement = Settlement::new(payer, receiver, amount_cents, date);
        if let Some(note) = note {
            settlement = settlement.with_note(note);
        }
        let settlement = settlement.normalized(&self.owner);

        self.repo.append_settlement(&settlement).await?;
        self.invalidate_overviews();
        Ok(settlement)
    }

    /// The settlement history between two people. Legacy records missing a
    /// direction tag are backfilled from the payer name and the normalized
    /// history is written back, so the migration runs once per pair.
    pub async fn settlements_between(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Vec<Settlement>, AppError> {
        let history = self.repo.load_settlements(a, b).await?;

        let needs_backfill = history
            .iter()
            .any(|s| s.direction.is_none() && (s.payer == self.owner || s.receiver == self.owner));
        if !needs_backfill {
            return Ok(history);
        }

        let normalized: Vec<Settlement> = history
            .into_iter()
            .map(|s| s.normalized(&self.owner))
            .collect();
        self.repo.save_settlements(a, b, &normalized).await?;
        Ok(normalized)
    }

    // ========================
    // Reconciliation
    // ========================

    /// The reconciled view for one friend: pairwise balance with the owner
    /// plus the friend's aggregated third-party balances.
    ///
    /// For the owner's own profile (`friend == owner`) the pairwise side is
    /// degenerate, so the overview mirrors the third-party aggregate
    /// instead: `you_owe` becomes what the owner owes others, `owes_you`
    /// what others owe the owner.
    pub async fn friend_overview(&self, friend: &str) -> Result<FriendOverview, AppError> {
        if friend != self.owner {
            self.get_friend(friend).await?;
        }

        let bills = self.repo.load_bills(&self.owner).await?;
        let own_history = self.settlements_between(&self.owner, friend).await?;

        let mut settlements_by_pair: HashMap<String, Vec<Settlement>> = HashMap::new();
        for person in third_parties(&bills, &self.owner, friend) {
            let history = self.repo.load_settlements(friend, &person).await?;
            if !history.is_empty() {
                settlements_by_pair.insert(pair_key(friend, &person), history);
            }
        }

        let fingerprint = inputs_fingerprint(&bills, &own_history, &settlements_by_pair);
        if let Some(cached) = self.cached_overview(friend, fingerprint) {
            return Ok(cached);
        }

        let breakdown = others_balances(&bills, &settlements_by_pair, &self.owner, friend);
        let others = OthersSummary::from_breakdown(breakdown);

        let balance = if friend == self.owner {
            BalanceOverview {
                you_owe: others.friend_owes_others,
                owes_you: others.others_owe_friend,
            }
        } else {
            let net = net_balance(&bills, &own_history, &self.owner, friend);
            BalanceOverview::from_net(net)
        };

        let overview = FriendOverview {
            friend: friend.to_string(),
            balance,
            others,
        };
        self.store_overview(friend, fingerprint, &overview);
        Ok(overview)
    }

    /// Reconciled overviews for the whole roster.
    pub async fn all_overviews(&self) -> Result<Vec<FriendOverview>, AppError> {
        let friends = self.list_friends().await?;
        let mut overviews = Vec::with_capacity(friends.len());
        for friend in friends {
            overviews.push(self.friend_overview(&friend.name).await?);
        }
        Ok(overviews)
    }

    /// Every settlement history on record, keyed by pair. Used for exports.
    pub async fn all_settlement_histories(
        &self,
    ) -> Result<BTreeMap<String, Vec<Settlement>>, AppError> {
        let mut histories = BTreeMap::new();
        for pair in self.repo.list_settlement_pairs().await? {
            let history = self.repo.load_settlements_by_pair(&pair).await?;
            histories.insert(pair, history);
        }
        Ok(histories)
    }

    fn cached_overview(&self, friend: &str, fingerprint: u64) -> Option<FriendOverview> {
        let cache = self.overview_cache.lock().ok()?;
        cache
            .get(friend)
            .filter(|(cached_fp, _)| *cached_fp == fingerprint)
            .map(|(_, overview)| overview.clone())
    }

    fn store_overview(&self, friend: &str, fingerprint: u64, overview: &FriendOverview) {
        if let Ok(mut cache) = self.overview_cache.lock() {
            cache.insert(friend.to_string(), (fingerprint, overview.clone()));
        }
    }

    fn invalidate_overviews(&self) {
        if let Ok(mut cache) = self.overview_cache.lock() {
            cache.clear();
        }
    }
}

/// Distinct split participants other than the owner and the friend.
fn third_parties(bills: &[Bill], owner: &str, friend: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut people = Vec::new();
    for bill in bills {
        for person in bill.participants() {
            if person != owner && person != friend && seen.insert(person.to_string()) {
                people.push(person.to_string());
            }
        }
    }
    people
}

/// Hash of the serialized reconciliation inputs. Balances are a pure
/// function of these, so an unchanged fingerprint means an unchanged
/// overview.
fn inputs_fingerprint(
    bills: &[Bill],
    own_history: &[Settlement],
    settlements_by_pair: &HashMap<String, Vec<Settlement>>,
) -> u64 {
    let mut hasher = DefaultHasher::new();
    serde_json::to_string(bills).unwrap_or_default().hash(&mut hasher);
    serde_json::to_string(own_history)
        .unwrap_or_default()
        .hash(&mut hasher);
    let mut pairs: Vec<_> = settlements_by_pair.iter().collect();
    pairs.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (pair, history) in pairs {
        pair.hash(&mut hasher);
        serde_json::to_string(history)
            .unwrap_or_default()
            .hash(&mut hasher);
    }
    hasher.finish()
}

fn validate_share_names(
    shares: &HashMap<String, f64>,
    participants: &[String],
) -> Result<(), AppError> {
    for name in shares.keys() {
        if !participants.contains(name) {
            return Err(AppError::UnknownShareParticipant(name.clone()));
        }
    }
    Ok(())
}
