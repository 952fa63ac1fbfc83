//! End-to-end recovery tests for ShardKeep
//!
//! Tests the complete pipeline: secret → deal → (seal) → paste/upload → classify → validate → combine
//!
//! Run with: cargo test --test recovery

use shardkeep_core::crypto::{KdfParams, PassphraseCipher};
use shardkeep_core::dealer::{deal, seal_all, ShareConfig};
use shardkeep_core::detect::{classify, ClassifiedInput, Unrecognized};
use shardkeep_core::intake::{paste_units, Channel, RawContent, RawInput};
use shardkeep_core::session::{
    drive, PasswordResponse, PasswordSource, Phase, RecoveryPolicy, RecoverySession, SessionStatus,
};
use shardkeep_core::{Gf256Shamir, RecoveryFailure, ShareEnvelope};

const SECRET: &[u8] = b"seed: abandon ability able about above absent";
const PASSWORD: &str = "correct horse";

/// Cheap Argon2 costs so tests stay fast
fn cipher() -> PassphraseCipher {
    PassphraseCipher::with_params(KdfParams {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    })
}

fn session(channel: Channel) -> RecoverySession {
    RecoverySession::new(channel, cipher(), Gf256Shamir)
}

fn dealt() -> Vec<ShareEnvelope> {
    deal(&Gf256Shamir, SECRET, ShareConfig::new(3, 5).unwrap()).unwrap()
}

fn pasted(envelopes: &[&ShareEnvelope]) -> Vec<RawInput> {
    let text: String = envelopes
        .iter()
        .map(|e| format!("{}\n\n", e.encode()))
        .collect();
    paste_units(&text)
}

/// Scenario A: any three of five shares reconstruct the secret
#[test]
fn test_three_of_five_reconstruct() {
    let shares = dealt();
    for picks in [[0, 1, 2], [4, 2, 0], [1, 3, 4]] {
        let chosen: Vec<&ShareEnvelope> = picks.iter().map(|&i| &shares[i]).collect();
        let mut s = session(Channel::Paste);
        let status = s.intake(pasted(&chosen)).unwrap();
        assert_eq!(
            status.secret().map(|s| s.as_bytes()),
            Some(SECRET),
            "picks {:?}",
            picks
        );
    }
}

/// Scenario B: two shares when three are needed
#[test]
fn test_two_of_three_is_insufficient() {
    let shares = dealt();
    let mut s = session(Channel::Paste);
    let status = s.intake(pasted(&[&shares[0], &shares[1]])).unwrap();
    let failure = status.failure().unwrap();
    assert_eq!(failure, &RecoveryFailure::InsufficientShares { have: 2, need: 3 });
    assert_eq!(failure.hint(), "Need 1 more share (2 of 3 provided)");
}

/// Scenario C: armored share, wrong password, then the right one
#[test]
fn test_wrong_password_then_correct() {
    let shares = dealt();
    let sealed = seal_all(&cipher(), &shares[2..3], PASSWORD, true).unwrap();

    let inputs = vec![
        RawInput::file("one.txt", shares[0].encode().into_bytes()),
        RawInput::file("two.txt", shares[1].encode().into_bytes()),
        RawInput::file(sealed[0].file_name(), sealed[0].as_bytes().to_vec()),
    ];

    let mut s = session(Channel::Upload);
    let rx = s.subscribe();
    s.intake(inputs).unwrap();
    assert_eq!(*rx.borrow(), Phase::AwaitingPassword { retry: false });

    let status = s.provide_password("battery staple").unwrap();
    assert_eq!(status, &SessionStatus::AwaitingPassword { retry: true });
    assert_eq!(s.last_failure(), Some(&RecoveryFailure::WrongPassword));

    let status = s.provide_password(PASSWORD).unwrap();
    assert_eq!(status.secret().unwrap().as_bytes(), SECRET);
    assert_eq!(s.resolved_envelopes().count(), 1);
    assert_eq!(*rx.borrow(), Phase::Succeeded);
}

/// Scenario D: a repeated index counts once
#[test]
fn test_duplicate_index_counted_once() {
    let shares = dealt();

    let mut s = session(Channel::Paste);
    s.intake(pasted(&[&shares[0], &shares[0], &shares[1], &shares[2]]))
        .unwrap();
    assert_eq!(s.status().secret().unwrap().as_bytes(), SECRET);
    let report = s.report().unwrap();
    assert_eq!(report.valid_count, 3);
    assert_eq!(report.duplicate_indices, vec![1]);

    let mut s = session(Channel::Paste);
    s.intake(pasted(&[&shares[0], &shares[0], &shares[1]])).unwrap();
    assert_eq!(
        s.status().failure(),
        Some(&RecoveryFailure::DuplicateShares { indices: vec![1] })
    );
    assert_eq!(s.report().unwrap().valid_count, 2);
}

/// Scenario E: an unknown binary upload is not a share
#[test]
fn test_unknown_binary_upload() {
    let junk = b"PK\x03\x04\x14\x00\x00\x00\x08\x00".to_vec();
    assert_eq!(
        classify(&RawContent::Bytes(junk.clone())),
        ClassifiedInput::Unrecognized(Unrecognized::UnknownBinary)
    );

    let shares = dealt();
    let mut inputs: Vec<RawInput> = shares[..3]
        .iter()
        .enumerate()
        .map(|(i, e)| RawInput::file(format!("share-{}.txt", i + 1), e.encode().into_bytes()))
        .collect();
    inputs.push(RawInput::file("archive.zip", junk));

    let policy = RecoveryPolicy {
        tolerate_unrecognized: true,
        ..Default::default()
    };
    let mut s = RecoverySession::with_policy(Channel::Upload, cipher(), Gf256Shamir, policy);
    s.intake(inputs.clone()).unwrap();
    assert_eq!(s.report().unwrap().valid_count, 3);
    assert_eq!(s.rejections().len(), 1);
    assert!(s.status().secret().is_some());

    let mut strict = session(Channel::Upload);
    strict.intake(inputs).unwrap();
    assert_eq!(strict.report().unwrap().valid_count, 3);
    assert_eq!(
        strict.status().failure(),
        Some(&RecoveryFailure::InvalidFormat {
            origins: vec!["file archive.zip".to_string()]
        })
    );
}

/// The armor check runs before envelope decoding, so a block whose body is
/// an envelope stays armored
#[test]
fn test_armor_takes_precedence_over_envelope() {
    let envelope = dealt().remove(0);
    let text = format!(
        "-----BEGIN PGP MESSAGE-----\n{}\n-----END PGP MESSAGE-----",
        envelope.encode()
    );
    match classify(&RawContent::Text(text)) {
        ClassifiedInput::EncryptedBlob(blob) => assert!(blob.armored),
        other => panic!("expected armored blob, got {:?}", other),
    }
}

/// Binary sealed uploads decrypt the same way as armored ones
#[test]
fn test_binary_sealed_uploads() {
    let shares = dealt();
    let sealed = seal_all(&cipher(), &shares[..3], PASSWORD, false).unwrap();
    let inputs: Vec<RawInput> = sealed
        .iter()
        .map(|s| RawInput::file(s.file_name(), s.as_bytes().to_vec()))
        .collect();

    let mut s = session(Channel::Upload);
    s.intake(inputs).unwrap();
    let status = s.provide_password(PASSWORD).unwrap();
    assert_eq!(status.secret().unwrap().as_bytes(), SECRET);
}

/// Password prompts answered from a script
struct Script {
    answers: Vec<&'static str>,
    prompts: Vec<bool>,
}

impl PasswordSource for Script {
    async fn request_password(&mut self, is_retry: bool) -> PasswordResponse {
        self.prompts.push(is_retry);
        match self.answers.pop() {
            Some(answer) => PasswordResponse::Provided(answer.to_string()),
            None => PasswordResponse::Cancelled,
        }
    }
}

#[tokio::test]
async fn test_drive_with_scripted_passwords() {
    let shares = dealt();
    let sealed = seal_all(&cipher(), &shares, PASSWORD, true).unwrap();
    let text: String = sealed
        .iter()
        .take(3)
        .map(|s| format!("{}\n", String::from_utf8_lossy(s.as_bytes())))
        .collect();

    let mut s = session(Channel::Paste);
    s.intake(paste_units(&text)).unwrap();
    assert_eq!(s.pending_blobs().count(), 3);

    // Answers are popped from the back
    let mut script = Script {
        answers: vec![PASSWORD, "first guess"],
        prompts: Vec::new(),
    };
    let s = drive(s, &mut script).await.unwrap();
    assert_eq!(s.status().secret().unwrap().as_bytes(), SECRET);
    assert_eq!(script.prompts, vec![false, true]);
    assert_eq!(s.password_attempts(), 2);
}

#[tokio::test]
async fn test_drive_gives_up_after_policy_limit() {
    let shares = dealt();
    let sealed = seal_all(&cipher(), &shares[..1], PASSWORD, true).unwrap();
    let policy = RecoveryPolicy {
        max_password_attempts: Some(1),
        ..Default::default()
    };
    let mut s = RecoverySession::with_policy(Channel::Upload, cipher(), Gf256Shamir, policy);
    s.intake(vec![RawInput::file("a.asc", sealed[0].as_bytes().to_vec())])
        .unwrap();

    let mut script = Script {
        answers: vec!["nope"],
        prompts: Vec::new(),
    };
    let s = drive(s, &mut script).await.unwrap();
    assert_eq!(s.status().failure(), Some(&RecoveryFailure::WrongPassword));
    assert_eq!(script.prompts, vec![false]);
}
