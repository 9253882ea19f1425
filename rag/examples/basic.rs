//! Builds an index over a handful of records with a toy embedder and retrieves context.

use qadex_core::EmbeddingModel;
use qadex_rag::{
    IndexBuilder, IndexConfig, MemoryRecordStore, PromptTemplate, Result, Retriever, VectorRecord,
};

struct DemoEmbedder;

impl EmbeddingModel for DemoEmbedder {
    fn dim(&self) -> usize {
        8
    }

    #[allow(clippy::cast_precision_loss)]
    async fn embed(&self, text: &str) -> qadex_core::Result<Vec<f32>> {
        if text.is_empty() {
            anyhow::bail!("cannot embed empty text");
        }
        let mut vector = vec![0.0; self.dim()];
        for word in text.split_whitespace() {
            let bucket = word.bytes().map(usize::from).sum::<usize>() % self.dim();
            vector[bucket] += 1.0;
        }
        Ok(vector)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let records = MemoryRecordStore::from_records([
        VectorRecord::new(1, "How do I reset my password?", "Use the link on the login page.", 4),
        VectorRecord::new(2, "Where is the library?", "In building C, second floor.", 7),
        VectorRecord::new(3, "When are exams published?", "Two weeks before the term ends.", 9),
    ]);

    let path = std::env::temp_dir().join("qadex-basic.vdb");
    let _ = std::fs::remove_file(&path);

    let builder = IndexBuilder::new(&DemoEmbedder, &records, IndexConfig::new(DemoEmbedder.dim()));
    let (index, report) = builder
        .open(&path, |progress| println!("{:?}", progress.stage))
        .await?;
    println!("inserted {} records, skipped {}", report.inserted, report.skipped.len());

    let question = "I forgot my password";
    let retriever = Retriever::new(&DemoEmbedder, index, &records);
    let context = retriever.retrieve(question, 2).await?;
    for entry in &context {
        println!("{}\t{:.3}\t{}", entry.id, entry.distance, entry.question);
    }

    println!("\n{}", PromptTemplate::default().render(&context, question));
    Ok(())
}
