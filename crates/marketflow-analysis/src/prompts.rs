//! Prompt assembly for the three LLM phases: relevance gate, workflow
//! generation, and final rendering.

use std::fmt::Write;

/// Reply used when the relevance gate rejects a question.
pub const OFF_TOPIC_REPLY: &str =
    "I can only help with questions about cryptocurrency market behaviour, \
     prices, and related news.";

/// System + user prompts for the relevance gate.
pub fn relevance_prompt(question: &str) -> (String, String) {
    let system = "You are a strict topic gate for a cryptocurrency market analysis service.\n\
                  Answer with exactly YES if the question is about cryptocurrency markets, \
                  prices, trading activity, or crypto news. Answer with exactly NO otherwise.\n\
                  Answer with one word only."
        .to_string();
    (system, question.to_string())
}

/// System + user prompts for workflow generation. `catalog_metadata` is the
/// serialized method catalog document and is embedded verbatim.
pub fn workflow_prompt(catalog_metadata: &str, question: &str, now_utc: &str) -> (String, String) {
    let mut system = String::new();
    system.push_str(
        "You are the workflow planner of a cryptocurrency analysis service. You translate a \
         user question into an Amazon-States-Language JSON state machine that collects the data \
         needed to answer it.\n\n",
    );
    system.push_str("State machine rules:\n");
    system.push_str("1) Return ONLY one valid JSON object: {\"StartAt\": ..., \"States\": {...}}. No prose, no code fences.\n");
    system.push_str("2) Allowed state Types: Pass, Task, Choice, Wait, Succeed, Fail, Map, Parallel.\n");
    system.push_str("3) A Task's Resource is a method name from the catalog below, or the literal arn:aws:states:::lambda:invoke with Parameters.FunctionName and Parameters.Payload.\n");
    system.push_str("4) In Parameters, a key ending in .$ takes its value from the given path, e.g. {\"pair.$\": \"$.pair\"}. Other keys are literals.\n");
    system.push_str("5) Each state's result is stored under $.<StateName> unless ResultPath says otherwise; later states can read it by that path.\n");
    system.push_str("6) Method arguments are positional: Payload/Parameters entries are passed in the order written.\n");
    system.push_str("7) Call RecordOutput for every piece of data the final answer should mention; data that is never recorded is lost.\n");
    system.push_str("8) Use Map with ItemsPath to repeat work per element, Parallel for independent branches, Choice to branch on collected values.\n");
    system.push_str("9) Timestamps use the format yyyy-MM-ddTHH:mm:ssZ. Enum parameters take one of the listed member names.\n");
    system.push_str("10) End the machine with \"End\": true on the last state or a Succeed state.\n\n");
    let _ = writeln!(system, "Current UTC time: {now_utc}\n");
    system.push_str("Method catalog:\n");
    system.push_str(catalog_metadata);
    system.push('\n');

    let user = format!("Build the state machine that collects the data to answer:\n{question}\n");
    (system, user)
}

/// System + user prompts for the final rendering pass.
pub fn answer_prompt(question: &str, collected: &str) -> (String, String) {
    let system = "You are a cryptocurrency market analyst. Answer the user's question using \
                  ONLY the collected data below. Be concise and concrete; cite numbers from the \
                  data. If the data is insufficient or describes a failure, say so plainly."
        .to_string();
    let user = format!("Question:\n{question}\n\nCollected data:\n{collected}");
    (system, user)
}
