pub mod invite_issuance;
pub mod signup;
