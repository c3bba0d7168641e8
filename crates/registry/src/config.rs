use moniker_types::Address;

/// Maximum number of domains one account may hold at creation time.
pub const DEFAULT_MAX_DOMAINS_PER_USER: usize = 5;
/// Registration fee in base units (0.0001 of a 10^18 unit).
pub const DEFAULT_REGISTRATION_FEE: u128 = 100_000_000_000_000;
/// Suffix appended to `label.partition` when rendering full names.
pub const DEFAULT_DOMAIN_SUFFIX: &str = "moniker.id";

/// Static registry parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Address of this registry; capabilities must name it as their target.
    pub address: Address,
    /// Account allowed to replace the corpus and withdraw fees.
    pub admin: Address,
    pub max_domains_per_user: usize,
    /// Zero disables the payment requirement.
    pub registration_fee: u128,
    pub domain_suffix: String,
}

impl RegistryConfig {
    pub fn new(address: Address, admin: Address) -> Self {
        Self {
            address,
            admin,
            max_domains_per_user: DEFAULT_MAX_DOMAINS_PER_USER,
            registration_fee: DEFAULT_REGISTRATION_FEE,
            domain_suffix: DEFAULT_DOMAIN_SUFFIX.to_string(),
        }
    }

    pub fn payment_required(&self) -> bool {
        self.registration_fee > 0
    }
}
