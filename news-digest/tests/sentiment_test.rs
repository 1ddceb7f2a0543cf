mod common;

use common::{article, hours_ago, init_tracing};
use news_digest::llm_adapter::{LlmAdapter, MockLlmAdapter};
use news_digest::sentiment::{Lexicon, SentimentAnalyzer, SentimentMode};
use news_digest::{DigestError, Result, SentimentLabel};
use std::sync::Arc;

#[tokio::test]
async fn test_lexicon_labels_by_word_balance() -> Result<()> {
    init_tracing();
    let lexicon = Lexicon::new()?;

    let bullish = lexicon.classify("Shares rise on strong profit growth");
    assert_eq!(bullish.label, SentimentLabel::Positive);
    assert_eq!(bullish.score, 1.0);

    let bearish = lexicon.classify("Stock falls as weak demand raises concern");
    assert_eq!(bearish.label, SentimentLabel::Negative);

    let mixed = lexicon.classify("Gain in one unit, loss in another");
    assert_eq!(mixed.label, SentimentLabel::Neutral);
    assert_eq!(mixed.score, 0.0);

    // "upgrade" is not the word "up"
    assert_eq!(lexicon.classify("Analyst upgrade").label, SentimentLabel::Neutral);
    Ok(())
}

#[tokio::test]
async fn test_breakdown_counts_per_ticker() -> Result<()> {
    init_tracing();
    let analyzer = SentimentAnalyzer::new(
        SentimentMode::Lexicon,
        &["AAPL".to_string(), "NVDA".to_string(), "XOM".to_string()],
    )?;
    let articles = vec![
        article("AAPL shares rise", "Strong quarter.", hours_ago(1)),
        article("NVDA and AAPL drop", "Weak guidance.", hours_ago(2)),
        article("NVDA holds", "Flat session.", hours_ago(3)),
    ];

    let (labelled, breakdown) = analyzer.analyze(articles).await;

    assert!(labelled.iter().all(|a| a.sentiment.is_some()));
    let aapl = &breakdown["AAPL"];
    assert_eq!((aapl.positive, aapl.negative, aapl.neutral), (1, 1, 0));
    let nvda = &breakdown["NVDA"];
    assert_eq!((nvda.positive, nvda.negative, nvda.neutral), (0, 1, 1));
    assert_eq!(nvda.headlines, vec!["NVDA and AAPL drop", "NVDA holds"]);
    assert_eq!(breakdown["XOM"].total(), 0);
    Ok(())
}

#[tokio::test]
async fn test_ai_mode_maps_replies_and_degrades_to_neutral() -> Result<()> {
    init_tracing();
    let mock = Arc::new(
        MockLlmAdapter::new("sentiment")
            .with_failure(DigestError::Provider("rate limited".to_string()))
            .with_fallback("Negative."),
    );
    let llm: Arc<dyn LlmAdapter> = mock.clone();
    let analyzer = SentimentAnalyzer::new(SentimentMode::Ai(llm), &["TSLA".to_string()])?;

    let articles = vec![article("TSLA cuts prices", "Margins squeezed.", hours_ago(1))];
    let (labelled, _) = analyzer.analyze(articles.clone()).await;
    assert_eq!(labelled[0].sentiment.map(|s| s.label), Some(SentimentLabel::Neutral));

    let (labelled, breakdown) = analyzer.analyze(articles).await;
    assert_eq!(labelled[0].sentiment.map(|s| s.label), Some(SentimentLabel::Negative));
    assert_eq!(breakdown["TSLA"].negative, 1);

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].max_tokens, 10);
    assert!(requests[0].user.contains("TSLA cuts prices"));
    Ok(())
}
