mod common;

use cirql::{
    error::{LedgerError, QuotaError},
    invite_ledger::InviteStatus,
};
use uuid::Uuid;

#[test]
fn created_code_validates_as_unused() {
    let ctx = common::context();
    let (issuer, _) = ctx.eligible_member("founder");
    let invite = ctx.invite_code(&issuer);
    assert!(invite.code.starts_with("CIRQL-"));
    assert!(!invite.used);
    assert_eq!(
        ctx.manager.ledger.validate(&invite.code).unwrap(),
        InviteStatus {
            issuer_id: issuer.id,
            used: false
        }
    );
    assert_eq!(
        ctx.manager
            .ledger
            .validate(&invite.code.to_lowercase())
            .unwrap()
            .issuer_id,
        issuer.id
    );
}

#[test]
fn unknown_code_is_not_found() {
    let ctx = common::context();
    assert!(matches!(
        ctx.manager.ledger.validate("CIRQL-AB12CD"),
        Err(LedgerError::CodeNotFound(_))
    ));
    assert!(matches!(
        ctx.manager.ledger.redeem("CIRQL-AB12CD", &Uuid::new_v4()),
        Err(LedgerError::CodeNotFound(_))
    ));
}

#[test]
fn code_redeems_once() {
    let ctx = common::context();
    let (issuer, _) = ctx.eligible_member("founder");
    let invite = ctx.invite_code(&issuer);
    let first = ctx.member("first");
    let second = ctx.member("second");

    ctx.manager.ledger.redeem(&invite.code, &first.id).unwrap();
    assert!(matches!(
        ctx.manager.ledger.redeem(&invite.code, &second.id),
        Err(LedgerError::AlreadyUsed(_))
    ));

    let issued = ctx.manager.ledger.list_issued(&issuer.id).unwrap();
    assert_eq!(issued.len(), 1);
    assert!(issued[0].used);
    assert_eq!(issued[0].used_by, Some(first.id));
    assert!(issued[0].used_at.is_some());
}

#[test]
fn only_unused_codes_can_be_withdrawn() {
    let ctx = common::context();
    let (issuer, _) = ctx.eligible_member("founder");
    let kept = ctx.invite_code(&issuer);
    let withdrawn = ctx.invite_code(&issuer);
    let redeemer = ctx.member("friend");
    ctx.manager.ledger.redeem(&kept.code, &redeemer.id).unwrap();

    ctx.manager.ledger.withdraw(&withdrawn.code).unwrap();
    assert!(matches!(
        ctx.manager.ledger.validate(&withdrawn.code),
        Err(LedgerError::CodeNotFound(_))
    ));
    assert!(matches!(
        ctx.manager.ledger.withdraw(&kept.code),
        Err(LedgerError::AlreadyUsed(_))
    ));
    assert!(ctx.manager.ledger.validate(&kept.code).unwrap().used);
    assert!(matches!(
        ctx.manager.ledger.withdraw(&withdrawn.code),
        Err(LedgerError::CodeNotFound(_))
    ));
    assert!(matches!(
        ctx.manager.ledger.withdraw("CIRQL-ZZZZZZ"),
        Err(LedgerError::CodeNotFound(_))
    ));
}

#[test]
fn second_seed_changes_nothing() {
    let ctx = common::context();
    let user_id = Uuid::new_v4();
    let seeded = ctx.manager.quotas.seed(&user_id, 3).unwrap();
    assert_eq!((seeded.total, seeded.used), (3, 0));
    ctx.manager.quotas.consume_one(&user_id).unwrap();

    assert!(matches!(
        ctx.manager.quotas.seed(&user_id, 10),
        Err(QuotaError::AlreadyExists(_))
    ));
    let quota = ctx.manager.quotas.get(&user_id).unwrap();
    assert_eq!((quota.total, quota.used, quota.remaining()), (3, 1, 2));
}

#[test]
fn consume_stops_at_total() {
    let ctx = common::context();
    let user_id = Uuid::new_v4();
    ctx.manager.quotas.seed(&user_id, 2).unwrap();
    assert_eq!(ctx.manager.quotas.consume_one(&user_id).unwrap().remaining(), 1);
    assert_eq!(ctx.manager.quotas.consume_one(&user_id).unwrap().remaining(), 0);
    assert!(matches!(
        ctx.manager.quotas.consume_one(&user_id),
        Err(QuotaError::QuotaExhausted(_))
    ));
    let quota = ctx.manager.quotas.get(&user_id).unwrap();
    assert_eq!((quota.total, quota.used), (2, 2));
}

#[test]
fn missing_quota_record_is_reported() {
    let ctx = common::context();
    let user_id = Uuid::new_v4();
    assert!(matches!(
        ctx.manager.quotas.get(&user_id),
        Err(QuotaError::NoQuotaRecord(_))
    ));
    assert!(matches!(
        ctx.manager.quotas.consume_one(&user_id),
        Err(QuotaError::NoQuotaRecord(_))
    ));
}
