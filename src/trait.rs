use chrono::{DateTime, Utc};

pub trait Expired {
    fn expired(&self) -> bool;
}

impl Expired for DateTime<Utc> {
    fn expired(&self) -> bool {
        (self.timestamp() - Utc::now().timestamp()).is_negative()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn past_is_expired_future_is_not() {
        assert!((Utc::now() - Duration::seconds(5)).expired());
        assert!(!(Utc::now() + Duration::seconds(60)).expired());
    }
}
