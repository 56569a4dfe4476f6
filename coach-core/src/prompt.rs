/// Instruction sent alongside the uploaded answer. The JSON skeleton is the
/// contract `decode::decode_feedback` validates against.
pub fn coaching_prompt(question: &str) -> String {
    format!(
        r#"
You are an expert HR Interview Coach. The user has answered the interview question: "{question}".

Task:
1. Transcribe the audio verbatim.
2. Analyze the answer using the STAR method (Situation, Task, Action, Result).
3. Identify hesitation words (um, uh, like) and count them.
4. Provide constructive feedback.

Output strictly valid JSON with this structure:
{{
    "transcription": "text...",
    "critique": "general feedback paragraph...",
    "starAnalysis": {{
        "situation": "...",
        "task": "...",
        "action": "...",
        "result": "..."
    }},
    "confidenceScore": {{
        "score": 8.5,
        "hesitationWords": 3,
        "hesitationDetails": ["um", "like"],
        "clarity": 9.0
    }},
    "strengths": ["point 1", "point 2"],
    "improvements": ["point 1", "point 2"],
    "overallRating": 8.5
}}

Scores (score, clarity, overallRating) are on a 0 to 10 scale.
"#
    )
}
