//! User prompts for each agent. The system side lives in the awful_aj
//! chat template configured per agent; these carry the task and the input
//! JSON, and pin down the exact answer shape.

pub fn report_ingestion(news_report_json: &str) -> String {
    format!(r#"You'll receive several articles from different outlets about the same event.
Distill them into one report. Answer with JSON only:

{{
  "facts": "neutral statement of what verifiably happened: who, what, when, where",
  "categories": ["politics|business|technology|science|health|environment|sports|culture|world|other"],
  "angles": [{{"corpus": "", "stance": "supportive|critical|neutral", "discourse": "mainstream|alternative"}}],
  "traits": {{"enriching": false, "uplifting": false}}
}}

CONSTRAINTS:
- facts: only what the sources agree on; no opinion, no speculation.
- categories: 1 to 3 from the list above.
- angles: 1 or 2 genuinely distinct viewpoints. Each corpus compiles everything
  the sources say from that viewpoint, exhaustively; it is not a summary.
- If the articles do not describe one coherent event, answer null.

ARTICLES JSON:
<{news_report_json}>"#)
}

pub fn report_deduplication(existing_reports_json: &str, new_report_json: &str) -> String {
    format!(r#"Decide whether the NEW report describes the same real-world event as one of the EXISTING reports.
Answer with JSON only:

{{"duplicateOfReportId": "<id of the existing report>" | null}}

CONSTRAINTS:
- Same actors doing the same thing at the same time or place is the same event,
  even when wording, emphasis or detail differ.
- When the overlap is substantial but you are unsure, pick the existing report.
- Follow-ups that report a genuinely new development are not duplicates.
- Only answer with an id that appears in EXISTING.

EXISTING REPORTS JSON:
<{existing_reports_json}>

NEW REPORT JSON:
<{new_report_json}>"#)
}

pub fn report_classification(report_json: &str) -> String {
    format!(r#"Classify who this report matters to. Answer with JSON only:

{{
  "classification": "broad|niche|off_topic",
  "reason": "one sentence",
  "traits": {{"enriching": false, "uplifting": false}}
}}

CONSTRAINTS:
- broad: relevant to most people in the country.
- niche: relevant to a specific interested audience.
- off_topic: not news (ads, listicles, celebrity gossip, horoscopes).
- enriching: the reader learns something of lasting value.
- uplifting: genuinely positive development.

REPORT JSON:
<{report_json}>"#)
}

pub fn article_composition(request_json: &str, angle_count: usize) -> String {
    format!(r#"Write a neutral news article from the report below, in the target language, for readers in the target country.
Then write one frame per angle: the same story told from that angle's viewpoint.
Answer with JSON only:

{{
  "headline": "",
  "body": "",
  "frames": [{{"headline": "", "body": "", "stance": "supportive|critical|neutral", "discourse": "mainstream|alternative"}}]
}}

CONSTRAINTS:
- The neutral body states only the facts; no loaded words.
- frames must contain exactly {angle_count} entries, in the same order as the report's angles.
- Each frame draws only on its angle's corpus.

REQUEST JSON:
<{request_json}>"#)
}

pub fn article_fabrication(request_json: &str, recent_count: usize) -> String {
    let last_index = recent_count as i64 - 1;
    format!(r#"You write fake news articles for a media-literacy game where readers try to spot them.
Write one plausible but invented article for the target country and language that
would blend in with the recent articles below. Answer with JSON only:

{{
  "headline": "",
  "body": "",
  "clarification": "what exactly was invented, for the reveal screen",
  "category": "politics|business|technology|science|health|environment|sports|culture|world|other",
  "tone": "serious|satirical",
  "insertAfterIndex": 0
}}

CONSTRAINTS:
- Never target real private individuals; never incite harm.
- Match the length and register of the recent articles.
- If a tone is given, use it; otherwise choose one.
- If a targetCategory is given, use it; otherwise infer one from the context.
- insertAfterIndex: the recent article (0 to {last_index}) after which yours would most
  naturally appear, or -1 to place it before all of them.

REQUEST JSON:
<{request_json}>"#)
}
