//! `ask`: answer one question from the graph.

use super::Runtime;
use crate::config::Config;
use crate::graphrag::QaAnswer;
use crate::Result;

pub async fn run(config: Config, question: &str) -> Result<QaAnswer> {
    let runtime = Runtime::connect(config).await?;
    let answer = runtime.qa()?.answer(question, &[]).await?;

    println!("🕵️ Entities: {}", answer.entity_label());
    println!("\n📚 Context:\n{}", answer.context);
    println!("\n💬 {}", answer.answer);

    Ok(answer)
}
