//! Wires the clustering core into the `loco-rs` boot sequence, mirroring the
//! teacher's `photos_processor.rs` initializer shape — except this core runs
//! a long-lived supervisor task rather than enqueuing a one-shot
//! `BackgroundWorker` job, since the dispatcher owns its own input stream
//! for the lifetime of the process (§4.7).

use crate::clients::{EmbeddingClient, VectorIndexClient};
use crate::clusterer::Clusterer;
use crate::common::settings::Settings;
use crate::dispatcher::{ChannelNewsStream, Dispatcher};
use crate::models::region_words;
use crate::output_sink::ChannelOutputSink;
use crate::region_tagger::RegionTagger;
use loco_rs::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const INPUT_CHANNEL_CAPACITY: usize = 1024;
const OUTPUT_CHANNEL_CAPACITY: usize = 1024;

pub struct DispatcherInitializer;

#[async_trait]
impl Initializer for DispatcherInitializer {
    fn name(&self) -> String {
        "news-dispatcher".to_string()
    }

    async fn before_run(&self, ctx: &AppContext) -> Result<()> {
        let settings = Settings::from_context(ctx);

        let embedding = Arc::new(EmbeddingClient::new(
            settings.embedding_url.clone(),
            settings.embedding_model_uri.clone(),
            settings.embedding_token.clone(),
            settings.embedding_folder_id.clone(),
            settings.max_requests,
            settings.embedding_timeout,
        ));
        let vector_index = VectorIndexClient::new(
            settings.vector_index_url.clone(),
            settings.embedding_timeout,
        );
        let clusterer = Arc::new(Clusterer::new(ctx.db.clone(), vector_index, settings.min_diff));

        let initial_words = region_words::Entity::region_words(&ctx.db)
            .await
            .unwrap_or_default();
        let region_tagger = Arc::new(RegionTagger::new(initial_words));
        {
            let db = ctx.db.clone();
            region_tagger.spawn_refresh_loop(settings.region_words_refresh, move || {
                let db = db.clone();
                async move {
                    region_words::Entity::region_words(&db)
                        .await
                        .map_err(Into::into)
                }
            });
        }

        // Real broker wiring (the message-queue protocol is out of scope,
        // §1) lands on the sending half of this channel; until then the
        // dispatcher idles waiting for input.
        let (_tx, rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let (output_tx, _output_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let output = Arc::new(ChannelOutputSink::new(output_tx));

        let cancellation = CancellationToken::new();
        let dispatcher = Dispatcher::new(
            settings.worker_concurrency,
            embedding,
            clusterer,
            region_tagger,
            output,
            cancellation,
        );

        tokio::spawn(async move {
            dispatcher.run(ChannelNewsStream(rx)).await;
        });

        Ok(())
    }
}
