//! Graph store backed by Neo4j

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use neo4rs::{query, Graph, Query};
use tracing::{debug, info};

use super::{EdgeWrite, GraphStats, GraphStore};
use crate::config::{Neo4jConfig, NodeTypePolicy};
use crate::models::{Article, Edge, ExportLink, ExportNode, GraphExport, Node, Triple};
use crate::normalize::is_canonical_relationship;
use crate::{Error, Result};

const MERGE_NODE_FIRST_WINS: &str = "MERGE (n:Entity {id: $id})
     ON CREATE SET n.type = $type, n.types = [$type]";

const MERGE_NODE_LAST_WINS: &str = "MERGE (n:Entity {id: $id})
     SET n.type = $type, n.types = [$type]";

const MERGE_NODE_MULTI_TYPE: &str = "MERGE (n:Entity {id: $id})
     ON CREATE SET n.type = $type, n.types = [$type]
     ON MATCH SET n.types = CASE
         WHEN $type IN coalesce(n.types, []) THEN n.types
         ELSE coalesce(n.types, []) + $type
     END";

/// Run `fut`, mapping an elapsed `limit` to `Error::Timeout`.
async fn bounded_by<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout {
            operation: format!("neo4j {}", operation),
            secs: limit.as_secs(),
        })?
}

/// Graph store backed by Neo4j.
///
/// Entities carry the `Entity` label and are keyed by `id`; the coarse type
/// lives in the `type` property. Articles carry the `Article` label keyed by
/// `url` and are never returned by entity queries.
pub struct Neo4jStore {
    graph: Graph,
    timeout: Duration,
}

impl Neo4jStore {
    /// Connect to the Neo4j server and verify the connection.
    pub async fn connect(config: &Neo4jConfig) -> Result<Self> {
        info!(uri = %config.uri, "🔌 Connecting to Neo4j");
        let timeout = Duration::from_secs(config.query_timeout_secs);

        let graph = tokio::time::timeout(
            timeout,
            Graph::new(
                config.uri.as_str(),
                config.username.as_str(),
                config.password.as_str(),
            ),
        )
        .await
        .map_err(|_| Error::Timeout {
            operation: "neo4j connect".to_string(),
            secs: config.query_timeout_secs,
        })??;

        let store = Self { graph, timeout };
        store.ping().await?;
        info!("✅ Connected to Neo4j");
        Ok(store)
    }

    /// Bound a store round trip by the configured timeout.
    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        bounded_by(self.timeout, operation, fut).await
    }

    async fn fetch_triples(&self, operation: &str, q: Query) -> Result<Vec<Triple>> {
        self.bounded(operation, async {
            let mut result = self.graph.execute(q).await?;
            let mut triples = Vec::new();
            while let Some(row) = result.next().await? {
                triples.push(Triple {
                    subject: row.get("subject")?,
                    relationship: row.get("relationship")?,
                    object: row.get("object")?,
                    sentiment: row.get("sentiment")?,
                });
            }
            Ok(triples)
        })
        .await
    }

    async fn count(&self, operation: &str, q: Query, column: &str) -> Result<i64> {
        self.bounded(operation, async {
            let mut result = self.graph.execute(q).await?;
            match result.next().await? {
                Some(row) => Ok(row.get::<i64>(column)?),
                None => Ok(0),
            }
        })
        .await
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn ping(&self) -> Result<String> {
        self.bounded("ping", async {
            let mut result = self
                .graph
                .execute(query("RETURN 'Hello from Neo4j' AS message"))
                .await?;
            match result.next().await? {
                Some(row) => Ok(row.get::<String>("message")?),
                None => Err(Error::Store("ping returned no rows".to_string())),
            }
        })
        .await
    }

    async fn init_schema(&self) -> Result<()> {
        info!("Initializing Neo4j schema...");

        let statements = [
            "CREATE CONSTRAINT entity_id IF NOT EXISTS FOR (n:Entity) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT article_url IF NOT EXISTS FOR (a:Article) REQUIRE a.url IS UNIQUE",
            "CREATE INDEX entity_type IF NOT EXISTS FOR (n:Entity) ON (n.type)",
        ];

        for statement in statements {
            self.bounded("init_schema", async {
                self.graph.run(query(statement)).await?;
                Ok(())
            })
            .await?;
        }

        info!("Schema initialized successfully");
        Ok(())
    }

    async fn upsert_node(&self, node: &Node, policy: NodeTypePolicy) -> Result<()> {
        let cypher = match policy {
            NodeTypePolicy::FirstWins => MERGE_NODE_FIRST_WINS,
            NodeTypePolicy::LastWins => MERGE_NODE_LAST_WINS,
            NodeTypePolicy::MultiType => MERGE_NODE_MULTI_TYPE,
        };
        let q = query(cypher)
            .param("id", node.id.clone())
            .param("type", node.node_type.clone());

        self.bounded("upsert_node", async {
            self.graph.run(q).await?;
            Ok(())
        })
        .await?;

        debug!(id = %node.id, node_type = %node.node_type, "Merged node");
        Ok(())
    }

    async fn upsert_edge(&self, edge: &Edge) -> Result<EdgeWrite> {
        // Relationship types cannot be parameters, so only vocabulary tokens
        // are ever interpolated.
        if !is_canonical_relationship(&edge.relationship) {
            return Err(Error::InvalidArgument(format!(
                "relationship {} is not canonical",
                edge.relationship
            )));
        }

        let cypher = format!(
            "MATCH (s:Entity {{id: $source}})
             MATCH (t:Entity {{id: $target}})
             MERGE (s)-[r:{}]->(t)
             SET r.sentiment = $sentiment
             RETURN count(r) AS written",
            edge.relationship
        );
        let q = query(&cypher)
            .param("source", edge.source.clone())
            .param("target", edge.target.clone())
            .param("sentiment", edge.sentiment.as_str());

        let written = self.count("upsert_edge", q, "written").await?;
        if written == 0 {
            return Ok(EdgeWrite::MissingEndpoint);
        }

        debug!(edge = %edge.key(), sentiment = %edge.sentiment, "Merged edge");
        Ok(EdgeWrite::Written)
    }

    async fn query_neighborhood(&self, names: &[String], limit: usize) -> Result<Vec<Triple>> {
        let q = query(
            "MATCH (n:Entity)-[r]-(m:Entity)
             WHERE n.id IN $names
             WITH DISTINCT r
             RETURN startNode(r).id AS subject,
                    type(r) AS relationship,
                    endNode(r).id AS object,
                    coalesce(r.sentiment, 'Neutral') AS sentiment
             LIMIT $limit",
        )
        .param("names", names.to_vec())
        .param("limit", limit as i64);

        self.fetch_triples("query_neighborhood", q).await
    }

    async fn query_global_sample(&self, limit: usize) -> Result<Vec<Triple>> {
        let q = query(
            "MATCH (s:Entity)-[r]->(t:Entity)
             RETURN s.id AS subject,
                    type(r) AS relationship,
                    t.id AS object,
                    coalesce(r.sentiment, 'Neutral') AS sentiment
             LIMIT $limit",
        )
        .param("limit", limit as i64);

        self.fetch_triples("query_global_sample", q).await
    }

    async fn article_exists(&self, url: &str) -> Result<bool> {
        let q = query("MATCH (a:Article {url: $url}) RETURN count(a) AS count").param("url", url);
        Ok(self.count("article_exists", q, "count").await? > 0)
    }

    async fn record_article(&self, article: &Article) -> Result<()> {
        let q = query(
            "MERGE (a:Article {url: $url})
             ON CREATE SET a.title = $title,
                           a.published = $published,
                           a.ingested_at = datetime()",
        )
        .param("url", article.link.clone())
        .param("title", article.title.clone())
        .param(
            "published",
            article
                .published
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default(),
        );

        self.bounded("record_article", async {
            self.graph.run(q).await?;
            Ok(())
        })
        .await
    }

    async fn export_graph(&self, limit: usize) -> Result<GraphExport> {
        let q = query(
            "MATCH (s:Entity)-[r]->(t:Entity)
             RETURN s.id AS source,
                    coalesce(s.type, 'Entity') AS source_group,
                    type(r) AS relationship,
                    coalesce(r.sentiment, 'Neutral') AS sentiment,
                    t.id AS target,
                    coalesce(t.type, 'Entity') AS target_group
             LIMIT $limit",
        )
        .param("limit", limit as i64);

        self.bounded("export_graph", async {
            let mut result = self.graph.execute(q).await?;
            let mut export = GraphExport::default();
            let mut seen = HashSet::new();

            while let Some(row) = result.next().await? {
                let source: String = row.get("source")?;
                let target: String = row.get("target")?;

                for (id, group_column) in [(&source, "source_group"), (&target, "target_group")] {
                    if seen.insert(id.clone()) {
                        export.nodes.push(ExportNode {
                            id: id.clone(),
                            group: row.get(group_column)?,
                        });
                    }
                }

                export.links.push(ExportLink {
                    source,
                    target,
                    relationship: row.get("relationship")?,
                    sentiment: row.get("sentiment")?,
                });
            }

            Ok(export)
        })
        .await
    }

    async fn stats(&self) -> Result<GraphStats> {
        let node_count = self
            .count(
                "stats",
                query("MATCH (n:Entity) RETURN count(n) AS count"),
                "count",
            )
            .await?;
        let edge_count = self
            .count(
                "stats",
                query("MATCH (:Entity)-[r]->(:Entity) RETURN count(r) AS count"),
                "count",
            )
            .await?;
        let article_count = self
            .count(
                "stats",
                query("MATCH (a:Article) RETURN count(a) AS count"),
                "count",
            )
            .await?;

        let sample_nodes = self
            .bounded("stats", async {
                let mut result = self
                    .graph
                    .execute(query(
                        "MATCH (n:Entity) RETURN n.id AS id, coalesce(n.type, 'Entity') AS type LIMIT 5",
                    ))
                    .await?;
                let mut nodes = Vec::new();
                while let Some(row) = result.next().await? {
                    nodes.push((row.get::<String>("id")?, row.get::<String>("type")?));
                }
                Ok(nodes)
            })
            .await?;

        Ok(GraphStats {
            node_count: node_count.max(0) as u64,
            edge_count: edge_count.max(0) as u64,
            article_count: article_count.max(0) as u64,
            sample_nodes,
        })
    }
}
