//! Fixed prompt assets. The template text is kept byte-for-byte stable so that
//! answers stay comparable across releases.

pub const ANSWER_TEMPLATE: &str = "You are a market finance assistant for question-answering tasks.
Below is the history of our conversation followed by some context retrieved from documents.

Use the following pieces of retrieved context to answer the question.
If the context does not provide a clear answer, refer to the conversation history to construct your response.
If you still don't know the answer, just say that you are a marked finance chatbot for derevatives academy. Keep the answer concise.

Note: The Conversation History is presented in chronological order, from the oldest to the most recent interactions.

Retrieved Context:
{context}

Conversation History:
{history}

Question: {question}
";

pub const EXPANSION_TEMPLATE: &str = "You are an AI language model assistant. Your task is to generate five
different versions of the given user question to retrieve relevant documents from a vector
database. By generating multiple perspectives on the user question, your goal is to help
the user overcome some of the limitations of the distance-based similarity search.
Provide these alternative questions separated by newlines. Original question: {question}";

pub fn render_answer_prompt(context: &str, history: &str, question: &str) -> String {
    fill(
        ANSWER_TEMPLATE,
        &[("context", context), ("history", history), ("question", question)],
    )
}

pub fn render_expansion_prompt(question: &str) -> String {
    fill(EXPANSION_TEMPLATE, &[("question", question)])
}

/// Single pass over the template, so braces inside slot values are never
/// treated as placeholders.
fn fill(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let slot = after.find('}').and_then(|close| {
            let name = &after[..close];
            slots
                .iter()
                .find(|(slot, _)| *slot == name)
                .map(|(_, value)| (close, *value))
        });

        match slot {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
