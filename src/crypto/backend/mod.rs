pub mod paillier_b;
pub mod plain_b;
