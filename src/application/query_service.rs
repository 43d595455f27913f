use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

use super::chunking::chunk_text;
use crate::config::AppConfig;
use crate::domain::{
    Embedder, LanguageModel, QueryEngine, QueryResponse, SearchQuery, SearchResult, VectorRepository,
};

pub const EMPTY_RESPONSE: &str = "Empty Response";

pub fn qa_prompt(context: &str, query: &str) -> String {
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {query}\n\
         Answer: "
    )
}

pub fn refine_prompt(query: &str, existing_answer: &str, context: &str) -> String {
    format!(
        "The original query is as follows: {query}\n\
         We have provided an existing answer: {existing_answer}\n\
         We have the opportunity to refine the existing answer (only if needed) with some more context below.\n\
         ------------\n\
         {context}\n\
         ------------\n\
         Given the new context, refine the original answer to better answer the query. \
         If the context isn't useful, return the original answer.\n\
         Refined Answer: "
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub similarity_top_k: usize,
    pub score_threshold: Option<f32>,
    /// Maximum characters of retrieved text per prompt.
    pub context_window: usize,
}

impl QueryOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            similarity_top_k: config.query.similarity_top_k,
            score_threshold: config.query.score_threshold,
            context_window: config.query.context_window,
        }
    }
}

/// Retrieval plus answer synthesis over the vector store.
pub struct QueryService {
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorRepository>,
    llm: Arc<dyn LanguageModel>,
    options: QueryOptions,
}

impl QueryService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorRepository>,
        llm: Arc<dyn LanguageModel>,
        options: QueryOptions,
    ) -> Self {
        Self { embedder, vectors, llm, options }
    }

    pub async fn retrieve(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        let limit = query.limit.unwrap_or(self.options.similarity_top_k);
        if limit == 0 {
            return Err(anyhow!("Query limit must be greater than zero"));
        }
        let mut vectors = self.embedder.embed(&[query.text.clone()]).await?;
        let query_vector = vectors
            .pop()
            .ok_or_else(|| anyhow!("Embedder returned no vector for the query"))?;
        let results = self
            .vectors
            .search(query_vector, limit, self.options.score_threshold)
            .await?;
        debug!("Retrieved {} nodes for query '{}'", results.len(), query.text);
        Ok(results)
    }

    /// Answers from the first packed context, then refines across the rest.
    async fn synthesize(&self, query: &str, sources: &[SearchResult]) -> Result<String> {
        let joined = sources
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let contexts = chunk_text(&joined, self.options.context_window);
        let mut contexts = contexts.iter();

        let first = match contexts.next() {
            Some(context) => context,
            None => return Ok(EMPTY_RESPONSE.to_string()),
        };
        let mut answer = self.llm.complete(&qa_prompt(first, query)).await?;
        for context in contexts {
            debug!("Refining answer with {} more characters of context", context.chars().count());
            answer = self
                .llm
                .complete(&refine_prompt(query, answer.trim(), context))
                .await?;
        }
        Ok(answer.trim().to_string())
    }
}

#[async_trait]
impl QueryEngine for QueryService {
    async fn query(&self, query: SearchQuery) -> Result<QueryResponse> {
        info!("Query: {}", query.text);
        let sources = self.retrieve(&query).await?;
        if sources.is_empty() {
            return Ok(QueryResponse { response: EMPTY_RESPONSE.to_string(), sources });
        }
        let response = self.synthesize(&query.text, &sources).await?;
        Ok(QueryResponse { response, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{MockEmbedder, MockLanguageModel};
    use crate::domain::vector_repository::MockVectorRepository;
    use mockall::predicate::*;
    use mockall::Sequence;

    fn hit(id: &str, text: &str, score: f32) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            ref_doc_id: format!("doc-{}", id),
            text: text.to_string(),
            score,
            metadata: None,
        }
    }

    fn embedder() -> MockEmbedder {
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|_| Ok(vec![vec![0.1, 0.2, 0.3]]));
        embedder.expect_dimension().return_const(3usize);
        embedder
    }

    fn options(context_window: usize) -> QueryOptions {
        QueryOptions { similarity_top_k: 20, score_threshold: None, context_window }
    }

    #[test]
    fn test_prompts_match_templates() {
        assert_eq!(
            qa_prompt("CTX", "Q?"),
            "Context information is below.\n---------------------\nCTX\n---------------------\n\
             Given the context information and not prior knowledge, answer the query.\nQuery: Q?\nAnswer: "
        );
        let refine = refine_prompt("Q?", "old", "more");
        assert!(refine.starts_with("The original query is as follows: Q?\nWe have provided an existing answer: old\n"));
        assert!(refine.contains("\n------------\nmore\n------------\n"));
        assert!(refine.ends_with("If the context isn't useful, return the original answer.\nRefined Answer: "));
    }

    #[tokio::test]
    async fn test_query_empty_retrieval_skips_llm() -> Result<()> {
        let mut vectors = MockVectorRepository::new();
        vectors.expect_search().times(1).returning(|_, _, _| Ok(Vec::new()));
        let mut llm = MockLanguageModel::new();
        llm.expect_complete().never();

        let service = QueryService::new(Arc::new(embedder()), Arc::new(vectors), Arc::new(llm), options(12000));
        let response = service.query(SearchQuery::new("anything")).await?;
        assert_eq!(response.response, "Empty Response");
        assert!(response.sources.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_query_uses_top_k_and_single_prompt() -> Result<()> {
        let mut vectors = MockVectorRepository::new();
        vectors
            .expect_search()
            .with(eq(vec![0.1, 0.2, 0.3]), eq(20usize), eq(None::<f32>))
            .times(1)
            .returning(|_, _, _| Ok(vec![hit("1", "Frameworks are overrated.", 0.9), hit("2", "I like Flask.", 0.8)]));
        let mut llm = MockLanguageModel::new();
        llm.expect_complete()
            .withf(|prompt| {
                prompt.contains("Frameworks are overrated.\n\nI like Flask.")
                    && prompt.contains("Query: What does the author think of web frameworks?")
            })
            .times(1)
            .returning(|_| Ok("  Mixed feelings.\n".to_string()));

        let service = QueryService::new(Arc::new(embedder()), Arc::new(vectors), Arc::new(llm), options(12000));
        let response = service
            .query(SearchQuery::new("What does the author think of web frameworks?"))
            .await?;
        assert_eq!(response.response, "Mixed feelings.");
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].ref_doc_id, "doc-1");
        Ok(())
    }

    #[tokio::test]
    async fn test_query_limit_overrides_top_k() -> Result<()> {
        let mut vectors = MockVectorRepository::new();
        vectors
            .expect_search()
            .with(always(), eq(3usize), eq(Some(0.5f32)))
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));
        let mut opts = options(12000);
        opts.score_threshold = Some(0.5);

        let service = QueryService::new(
            Arc::new(embedder()),
            Arc::new(vectors),
            Arc::new(MockLanguageModel::new()),
            opts,
        );
        let query = SearchQuery { text: "q".to_string(), limit: Some(3) };
        service.query(query).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_query_refines_over_extra_contexts() -> Result<()> {
        let mut vectors = MockVectorRepository::new();
        vectors
            .expect_search()
            .returning(|_, _, _| Ok(vec![hit("1", "first node text", 0.9), hit("2", "second node text", 0.7)]));

        let mut seq = Sequence::new();
        let mut llm = MockLanguageModel::new();
        llm.expect_complete()
            .withf(|prompt| prompt.starts_with("Context information is below.") && prompt.contains("first node text"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("draft ".to_string()));
        llm.expect_complete()
            .withf(|prompt| {
                prompt.contains("We have provided an existing answer: draft\n") && prompt.contains("second node text")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("final".to_string()));

        // Window fits one node at a time
        let service = QueryService::new(Arc::new(embedder()), Arc::new(vectors), Arc::new(llm), options(20));
        let response = service.query(SearchQuery::new("q")).await?;
        assert_eq!(response.response, "final");
        Ok(())
    }

    #[tokio::test]
    async fn test_query_propagates_llm_error() {
        let mut vectors = MockVectorRepository::new();
        vectors.expect_search().returning(|_, _, _| Ok(vec![hit("1", "text", 0.9)]));
        let mut llm = MockLanguageModel::new();
        llm.expect_complete().returning(|_| Err(anyhow!("rate limited")));

        let service = QueryService::new(Arc::new(embedder()), Arc::new(vectors), Arc::new(llm), options(12000));
        let err = service.query(SearchQuery::new("q")).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_retrieve_rejects_zero_limit() {
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().never();
        let mut vectors = MockVectorRepository::new();
        vectors.expect_search().never();

        let service = QueryService::new(
            Arc::new(embedder),
            Arc::new(vectors),
            Arc::new(MockLanguageModel::new()),
            options(12000),
        );
        let query = SearchQuery { text: "q".to_string(), limit: Some(0) };
        let err = service.retrieve(&query).await.unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[tokio::test]
    async fn test_retrieve_fails_without_query_vector() {
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|_| Ok(Vec::new()));
        let mut vectors = MockVectorRepository::new();
        vectors.expect_search().never();

        let service = QueryService::new(
            Arc::new(embedder),
            Arc::new(vectors),
            Arc::new(MockLanguageModel::new()),
            options(12000),
        );
        assert!(service.retrieve(&SearchQuery::new("q")).await.is_err());
    }
}
