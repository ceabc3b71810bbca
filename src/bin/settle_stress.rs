//! Concurrent settlement check
//!
//! Fires N concurrent settlements at one operator and verifies the operator's
//! accrued commission grew by exactly the sum of the receipts.
//!
//! Run with: cargo run --bin settle_stress --release -- --washes 50 --operator 1

use std::time::Instant;

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;

use motowash::domain::{OperationContext, PaymentMethod, Price};
use motowash::handlers::{Collaborators, RecordWashCommand, TransactionRecorder};
use motowash::Config;

fn arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let washes: usize = arg(&args, "--washes", 50);
    let operator_id: i64 = arg(&args, "--operator", 1);
    let price = Price::from_integer(arg(&args, "--price", 25_000))?;

    let config = Config::from_env()?;
    let collaborators = Collaborators::new(config.settlement_settings()?);

    println!("Settlement stress - {washes} concurrent washes for operator {operator_id}");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    let before: Decimal =
        sqlx::query_scalar("SELECT total_commission FROM operators WHERE id = $1")
            .bind(operator_id)
            .fetch_one(&pool)
            .await?;

    let start = Instant::now();
    let run_tag = uuid::Uuid::new_v4().simple().to_string()[..6].to_uppercase();

    let tasks: Vec<_> = (0..washes)
        .map(|i| {
            let recorder = TransactionRecorder::new(pool.clone(), collaborators.clone());
            let command = RecordWashCommand::for_plate(
                operator_id,
                format!("ST{run_tag}{i}"),
                price,
                PaymentMethod::Cash,
            )
            .with_customer_name(format!("Stress {i}"));

            tokio::spawn(async move {
                let context = OperationContext::new();
                recorder.record(command, &context).await
            })
        })
        .collect();

    let mut settled = Decimal::ZERO;
    let mut failures = 0usize;
    for task in tasks {
        match task.await? {
            Ok(receipt) => settled += receipt.commission_amount,
            Err(e) => {
                failures += 1;
                eprintln!("settlement failed: {e}");
            }
        }
    }

    let elapsed = start.elapsed();

    let after: Decimal =
        sqlx::query_scalar("SELECT total_commission FROM operators WHERE id = $1")
            .bind(operator_id)
            .fetch_one(&pool)
            .await?;

    println!("\n=== Settlement Stress Results ===");
    println!("Washes: {washes} ({failures} failed)");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Commission settled: {settled}");
    println!("total_commission: {before} -> {after}");

    if after - before != settled {
        anyhow::bail!(
            "lost update: total_commission grew by {} but receipts sum to {}",
            after - before,
            settled
        );
    }

    println!("OK: no lost updates");
    Ok(())
}
