//! Behaviour every [`AccountRepository`] must share.
//!
//! Each check uses its own random emails so the suite can run against a
//! database that is not emptied between runs.

use uuid::Uuid;

use crate::account::{AccountRepository, MAX_EMAIL_LENGTH, NewAccount, Profile};
use crate::crypto::Password;
use crate::error::Error;

fn email(prefix: &str) -> String {
    format!("{prefix}+{}@x.com", Uuid::new_v4().simple())
}

pub(crate) async fn run_all(repo: &dyn AccountRepository) {
    scenario(repo).await;
    uniqueness(repo).await;
    concurrent_registration(repo).await;
    hash_round_trip(repo).await;
    anti_enumeration(repo).await;
    lifecycle(repo).await;
    reset_password(repo).await;
    update(repo).await;
    get_by_email(repo).await;
    email_length(repo).await;
    profile_round_trip(repo).await;
}

/// Register, log in, fail with a wrong password, fail to register twice.
pub(crate) async fn scenario(repo: &dyn AccountRepository) {
    let email = email("scenario");

    let account = repo
        .register(NewAccount::new(email.clone(), "secret1"))
        .await
        .unwrap();
    assert_eq!(account.email, email);

    let logged = repo.login(&email, &"secret1".into()).await.unwrap();
    assert_eq!(logged.id, account.id);

    let err = repo.login(&email, &"wrong".into()).await;
    assert!(matches!(err, Err(Error::InvalidCredentials)));

    let err = repo.register(NewAccount::new(email, "other")).await;
    assert!(matches!(err, Err(Error::DuplicateEmail)));
}

pub(crate) async fn uniqueness(repo: &dyn AccountRepository) {
    let email = email("unique");

    let first = repo
        .register(NewAccount::new(email.clone(), "secret1"))
        .await
        .unwrap();

    for _ in 0..3 {
        let err = repo.register(NewAccount::new(email.clone(), "secret2")).await;
        assert!(matches!(err, Err(Error::DuplicateEmail)));
    }

    // The original credentials still hold.
    let logged = repo.login(&email, &"secret1".into()).await.unwrap();
    assert_eq!(logged.id, first.id);
}

pub(crate) async fn concurrent_registration(repo: &dyn AccountRepository) {
    let email = email("race");

    let (a, b) = tokio::join!(
        repo.register(NewAccount::new(email.clone(), "secret1")),
        repo.register(NewAccount::new(email.clone(), "secret2")),
    );

    let outcomes = [a, b];
    let created = outcomes.iter().filter(|r| r.is_ok()).count();
    let rejected = outcomes
        .iter()
        .filter(|r| matches!(r, Err(Error::DuplicateEmail)))
        .count();

    assert_eq!(created, 1);
    assert_eq!(rejected, 1);
}

pub(crate) async fn hash_round_trip(repo: &dyn AccountRepository) {
    let account = repo
        .register(NewAccount::new(email("hash"), "secret1"))
        .await
        .unwrap();

    let hash = account.password_hash.as_str();
    assert_ne!(hash, "secret1");
    assert!(hash.starts_with("$argon2id$"));

    let stored = repo.get_by_id(&account.id).await.unwrap();
    assert_eq!(stored.password_hash, account.password_hash);
}

/// Unknown email and wrong password are indistinguishable.
pub(crate) async fn anti_enumeration(repo: &dyn AccountRepository) {
    let email = email("enum");
    repo.register(NewAccount::new(email.clone(), "secret1"))
        .await
        .unwrap();

    let unknown = repo.login(&self::email("ghost"), &"secret1".into()).await;
    let wrong = repo.login(&email, &"secret2".into()).await;

    let (Err(unknown), Err(wrong)) = (unknown, wrong) else {
        panic!("login should fail");
    };
    assert!(matches!(unknown, Error::InvalidCredentials));
    assert!(matches!(wrong, Error::InvalidCredentials));
    assert_eq!(unknown.to_string(), wrong.to_string());
}

/// Delete is hard and idempotent, and frees the email.
pub(crate) async fn lifecycle(repo: &dyn AccountRepository) {
    let email = email("lifecycle");
    let account = repo
        .register(NewAccount::new(email.clone(), "secret1"))
        .await
        .unwrap();

    assert_eq!(repo.get_by_id(&account.id).await.unwrap(), account);

    repo.delete(&account.id).await.unwrap();
    repo.delete(&account.id).await.unwrap();

    let err = repo.get_by_id(&account.id).await;
    assert!(matches!(err, Err(Error::NotFound)));

    let err = repo.login(&email, &"secret1".into()).await;
    assert!(matches!(err, Err(Error::InvalidCredentials)));

    repo.register(NewAccount::new(email, "secret2"))
        .await
        .unwrap();
}

pub(crate) async fn reset_password(repo: &dyn AccountRepository) {
    let email = email("reset");
    let account = repo
        .register(NewAccount::new(email.clone(), "secret1"))
        .await
        .unwrap();

    let new_password = Password::new("secret2");
    repo.reset_password(&email, &new_password).await.unwrap();
    let first = repo.get_by_id(&account.id).await.unwrap().password_hash;

    // Same password again: still valid, salted differently.
    repo.reset_password(&email, &new_password).await.unwrap();
    let second = repo.get_by_id(&account.id).await.unwrap().password_hash;
    assert_ne!(first, second);

    assert!(repo.login(&email, &new_password).await.is_ok());
    let err = repo.login(&email, &"secret1".into()).await;
    assert!(matches!(err, Err(Error::InvalidCredentials)));

    // Unknown email is not reported.
    repo.reset_password(&self::email("ghost"), &new_password)
        .await
        .unwrap();
}

pub(crate) async fn update(repo: &dyn AccountRepository) {
    let mut account = repo
        .register(NewAccount::new(email("update"), "secret1"))
        .await
        .unwrap();
    let other = repo
        .register(NewAccount::new(email("taken"), "secret1"))
        .await
        .unwrap();

    let old_email = account.email.clone();
    account.email = email("moved");
    account.profile.set_name("Ada");
    repo.update(&account).await.unwrap();

    let stored = repo.get_by_id(&account.id).await.unwrap();
    assert_eq!(stored, account);
    assert!(repo.login(&account.email, &"secret1".into()).await.is_ok());
    assert!(matches!(
        repo.login(&old_email, &"secret1".into()).await,
        Err(Error::InvalidCredentials)
    ));

    // Saving unchanged is fine.
    repo.update(&account).await.unwrap();

    let mut clash = account.clone();
    clash.email = other.email.clone();
    assert!(matches!(
        repo.update(&clash).await,
        Err(Error::DuplicateEmail)
    ));
    assert_eq!(repo.get_by_id(&account.id).await.unwrap(), account);

    let mut ghost = account.clone();
    ghost.id = crate::account::AccountId::generate();
    ghost.email = email("ghost");
    assert!(matches!(repo.update(&ghost).await, Err(Error::NotFound)));
}

pub(crate) async fn get_by_email(repo: &dyn AccountRepository) {
    let email = email("lookup");
    let account = repo
        .register(NewAccount::new(email.clone(), "secret1"))
        .await
        .unwrap();

    assert_eq!(repo.get_by_email(&email).await.unwrap(), account);

    // Exact match only.
    let err = repo.get_by_email(&email.to_uppercase()).await;
    assert!(matches!(err, Err(Error::NotFound)));
    let err = repo.get_by_email(&self::email("ghost")).await;
    assert!(matches!(err, Err(Error::NotFound)));

    repo.delete(&account.id).await.unwrap();
    let err = repo.get_by_email(&email).await;
    assert!(matches!(err, Err(Error::NotFound)));
}

/// Emails up to the limit are stored by every backend, longer ones are
/// refused the same way everywhere.
pub(crate) async fn email_length(repo: &dyn AccountRepository) {
    let id = Uuid::new_v4().simple().to_string();
    let local = format!("{id:a<64}");
    let domain = format!("{}.com", "b".repeat(251));
    let longest = format!("{local}@{domain}");
    assert_eq!(longest.chars().count() as u64, MAX_EMAIL_LENGTH);

    let mut account = repo
        .register(NewAccount::new(longest.clone(), "secret1"))
        .await
        .unwrap();
    assert_eq!(repo.get_by_email(&longest).await.unwrap(), account);

    let too_long = format!("x{longest}");
    let err = repo.register(NewAccount::new(too_long.clone(), "secret1")).await;
    assert!(matches!(err, Err(Error::EmailTooLong)));

    let stored = account.clone();
    account.email = too_long;
    assert!(matches!(repo.update(&account).await, Err(Error::EmailTooLong)));
    assert_eq!(repo.get_by_id(&account.id).await.unwrap(), stored);
}

pub(crate) async fn profile_round_trip(repo: &dyn AccountRepository) {
    let mut profile = Profile::default();
    profile.set_name("Ada Lovelace");
    profile.set_bio("Analytical engine enthusiast. ✨");
    profile.set("location", "London");

    let account = repo
        .register(NewAccount::new(email("profile"), "secret1").with_profile(profile.clone()))
        .await
        .unwrap();
    assert_eq!(account.profile, profile);

    let stored = repo.get_by_id(&account.id).await.unwrap();
    assert_eq!(stored.profile, profile);
    assert_eq!(stored.profile.name(), Some("Ada Lovelace"));

    let empty = repo
        .register(NewAccount::new(email("bare"), "secret1"))
        .await
        .unwrap();
    let stored = repo.get_by_id(&empty.id).await.unwrap();
    assert!(stored.profile.is_empty());
}
