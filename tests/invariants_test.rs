mod support;

use chrono::{Duration, Utc};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::collections::HashSet;

use internship_intake::{
    config::IntakeField,
    models::inbound_message::InboundMessage,
};
use support::{document, text, Harness};

const SENDERS: [&str; 4] = ["+1001", "+1002", "+1003", "+1004"];

fn random_message(rng: &mut StdRng, sender: &str) -> InboundMessage {
    match rng.gen_range(0..10) {
        0 => text(sender, "hello"),
        1 => text(sender, "APPLY WD0001 SECRET12"),
        2 => text(sender, "apply da0001 secret34"),
        3 => text(sender, "APPLY OL0001 SECRET56"),
        4 => text(sender, "APPLY WD0001 NOPE"),
        5 => text(sender, "Jane Doe"),
        6 => text(sender, "jane@example.com"),
        7 => text(sender, "x"),
        8 => document(sender, "image/png"),
        _ => document(sender, "application/pdf"),
    }
}

fn assert_invariants(h: &Harness) {
    let rows = h.applications.all();
    for sender in SENDERS {
        let open = rows
            .iter()
            .filter(|a| a.whatsapp_number == sender && !a.is_completed())
            .count();
        assert!(open <= 1, "{} has {} open conversations", sender, open);
    }

    let mut completed = HashSet::new();
    for app in rows.iter().filter(|a| a.is_completed()) {
        let internship_id = app.internship_id.expect("completed has internship");
        assert!(
            completed.insert((internship_id, app.whatsapp_number.clone())),
            "double completion for {}",
            app.whatsapp_number
        );
        assert!(app.cv_storage_key.is_some());
        assert!(app.applied_at.is_some());
        assert!(app.full_name.is_some() && app.email.is_some());
    }
}

#[tokio::test]
async fn random_conversations_keep_the_invariants() {
    for seed in [7_u64, 42, 1234] {
        let mut rng = StdRng::seed_from_u64(seed);
        let h = Harness::with_fields(vec![IntakeField::FullName, IntakeField::Email]);
        h.internships.open("Web Developer Intern", "WD0001", "SECRET12");
        h.internships.open("Data Intern", "DA0001", "SECRET34");
        h.internships
            .add("Old Intern", "OL0001", "SECRET56", Utc::now() - Duration::days(2));

        let mut history: Vec<InboundMessage> = Vec::new();
        for _ in 0..300 {
            let message = if !history.is_empty() && rng.gen_bool(0.1) {
                history.choose(&mut rng).cloned().unwrap()
            } else {
                let sender = SENDERS.choose(&mut rng).unwrap();
                random_message(&mut rng, sender)
            };
            h.state.intake_service.handle_message(&message).await.unwrap();
            history.push(message);
            assert_invariants(&h);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_messages_from_one_sender_share_a_conversation() {
    let h = Harness::with_fields(Vec::new());
    h.internships.open("Web Developer Intern", "WD0001", "SECRET12");

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let intake = h.state.intake_service.clone();
        let message = text("+1001", "APPLY WD0001 SECRET12");
        tasks.push(tokio::spawn(async move { intake.handle_message(&message).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let rows = h.applications.for_sender("+1001");
    assert_eq!(rows.len(), 1);
    assert_invariants(&h);

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let intake = h.state.intake_service.clone();
        let message = document("+1001", "application/pdf");
        tasks.push(tokio::spawn(async move { intake.handle_message(&message).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let rows = h.applications.for_sender("+1001");
    assert_eq!(rows.iter().filter(|a| a.is_completed()).count(), 1);
    assert_invariants(&h);
}
