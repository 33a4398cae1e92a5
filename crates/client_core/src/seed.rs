use uuid::Uuid;

/// Fresh client seed: 32 lowercase hex characters.
pub fn generate_client_seed() -> String {
    Uuid::new_v4().simple().to_string()
}
