use budget_choice_experiment::{
    advice::{AdviceRequester, MockAdviceService},
    models::{Condition, Participant, Sex},
    session::{AdvicePolicy, Session},
};
use rand::Rng;
use tracing::info;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Budget-choice experiment demo starting");

    // Offline advice generator; the live client is wired up in the API binary
    let requester = AdviceRequester::new(Box::new(MockAdviceService));

    let participant = Participant {
        participant_id: "demo-participant".to_string(),
        age: 28,
        sex: Sex::Other,
    };

    let mut session = Session::new(
        Uuid::new_v4(),
        participant,
        Condition::Treatment,
        AdvicePolicy::EveryRoundPastMidpoint,
    );

    info!(
        session_id = ?session.session_id,
        condition = %session.condition,
        "Session started"
    );

    let mut rng = rand::thread_rng();

    while !session.complete {
        let line = session.current_line;
        let choice_x: u32 = rng.gen_range(0..=100);

        let outcome = session.confirm_choice(choice_x)?;
        info!(
            round = outcome.record.round,
            choice_x,
            choice_y = outcome.record.choice_y,
            income = line.income,
            "Round confirmed"
        );

        if outcome.advice_due {
            let rows = session
                .ledger()
                .rows_for_participant(&session.participant.participant_id);
            match requester.request_advice(&rows).await {
                Ok(advice) => println!("Advice after round {}: {}", outcome.record.round, advice),
                Err(e) => eprintln!("Advice unavailable: {}", e),
            }
        }
    }

    println!("\n=== EXPORTED RESPONSES ===");
    println!("{}", session.export_csv()?);

    Ok(())
}
