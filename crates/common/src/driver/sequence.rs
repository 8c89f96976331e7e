use crate::bridge::ReportChannel;
use crate::document::{AllDocsOptions, Document};
use crate::store::{Database, ReplicationOptions, StoreClient};

use super::context::REMOTE_TEST_DB;
use super::{Chain, Driver, Halt, Mode, RunContext, Step};

impl<C, R> Driver<C, R>
where
    C: StoreClient,
    R: ReportChannel,
{
    /// Run every step of one pass, stopping at the first failure
    pub(super) async fn pass<Ch: ReportChannel>(
        &self,
        chain: &Chain<'_, Ch>,
        ctx: &mut RunContext<C>,
    ) -> Result<(), Halt> {
        self.provision(chain, ctx).await?;
        self.clear_previous_state(chain, ctx).await?;
        let primary = self.seed(chain, ctx).await?;
        let secondary = self.replicate(chain, ctx, &primary).await?;
        self.verify(chain, ctx, &primary, &secondary).await
    }

    async fn provision<Ch: ReportChannel>(
        &self,
        chain: &Chain<'_, Ch>,
        ctx: &mut RunContext<C>,
    ) -> Result<(), Halt> {
        let config = &self.config;

        match ctx.mode {
            Mode::Direct => {
                ctx.local_base.clear();
                let result = self
                    .provisioner
                    .client_to_hub(&config.host, config.port)
                    .await;
                chain
                    .handle_then_continue(
                        Step::ProvisionPrimary,
                        result,
                        "capture_remote_test_db",
                        |base| ctx.remote_test_db = format!("{}{}", base, REMOTE_TEST_DB),
                        Some(Step::DestroyRemoteTestDb),
                    )
                    .await
            }
            Mode::Bridged => {
                let result = self
                    .provisioner
                    .client_to_hub(&config.host, config.port)
                    .await;
                chain
                    .handle_then_continue(
                        Step::ProvisionPrimary,
                        result,
                        "capture_local_base",
                        |base| ctx.local_base = base,
                        Some(Step::ProvisionSecondary),
                    )
                    .await?;

                let result = self
                    .provisioner
                    .hub_to_hub(&ctx.local_base, &config.host, config.second_port)
                    .await;
                chain
                    .handle_then_continue(
                        Step::ProvisionSecondary,
                        result,
                        "capture_remote_test_db",
                        |remote| ctx.remote_test_db = format!("{}{}", remote, REMOTE_TEST_DB),
                        Some(Step::DestroyRemoteTestDb),
                    )
                    .await
            }
        }
    }

    async fn clear_previous_state<Ch: ReportChannel>(
        &self,
        chain: &Chain<'_, Ch>,
        ctx: &RunContext<C>,
    ) -> Result<(), Halt> {
        let result = self.store.destroy(&ctx.remote_test_db).await;
        chain
            .fail_or_continue(
                Step::DestroyRemoteTestDb,
                result,
                Step::DestroyLocalScratchDb,
            )
            .await?;

        let result = self.store.destroy(&ctx.local_locator()).await;
        chain
            .fail_or_continue(Step::DestroyLocalScratchDb, result, Step::DestroyLocalCopyDb)
            .await?;

        let result = self.store.destroy(&ctx.local_copy_locator()).await;
        chain
            .fail_or_continue(
                Step::DestroyLocalCopyDb,
                result,
                Step::CreateLocalAndSeedDoc1,
            )
            .await
    }

    /// Create the primary store, write the two seeds and the generated batch
    async fn seed<Ch: ReportChannel>(
        &self,
        chain: &Chain<'_, Ch>,
        ctx: &mut RunContext<C>,
    ) -> Result<Database<C>, Halt> {
        let result = Database::open(&self.store, &ctx.local_locator());
        let primary = chain
            .handle_then_continue(
                Step::CreateLocalAndSeedDoc1,
                result,
                "open_local",
                |db: Database<C>| {
                    ctx.primary = Some(db.clone());
                    db
                },
                None,
            )
            .await?;

        let result = primary.put(seed_doc("bar")).await;
        chain
            .fail_or_continue(Step::CreateLocalAndSeedDoc1, result, Step::SeedDoc2)
            .await?;

        let result = primary.put(seed_doc("blah")).await;
        chain
            .fail_or_continue(Step::SeedDoc2, result, Step::BulkInsertGenerated)
            .await?;

        // Every generated document of a pass carries the same tag
        let tag = format!("{}1", self.ids.new_unique_id());
        let batch = (0..self.config.bulk_count)
            .map(|_| Document::new().field("silly", tag.clone()))
            .collect();
        ctx.tag = Some(tag);

        let result = primary.bulk_insert(batch).await;
        chain
            .fail_or_continue(
                Step::BulkInsertGenerated,
                result,
                Step::ReplicateLocalToRemote,
            )
            .await?;

        Ok(primary)
    }

    /// Push the primary store out, then pull it back into the local copy
    async fn replicate<Ch: ReportChannel>(
        &self,
        chain: &Chain<'_, Ch>,
        ctx: &mut RunContext<C>,
        primary: &Database<C>,
    ) -> Result<Database<C>, Halt> {
        let bridged = ctx.mode.is_bridged();

        let options = ReplicationOptions::default()
            .create_target()
            .via_hub(bridged);
        let result = primary.replicate_to(&ctx.remote_test_db, &options).await;
        chain
            .fail_or_continue(
                Step::ReplicateLocalToRemote,
                result,
                Step::ReplicateRemoteToLocalCopy,
            )
            .await?;

        self.scheduler.after(self.config.settle).await;

        let result = Database::open(&self.store, &ctx.local_copy_locator());
        let secondary = chain
            .handle_then_continue(
                Step::ReplicateRemoteToLocalCopy,
                result,
                "open_local_copy",
                |db: Database<C>| {
                    ctx.secondary = Some(db.clone());
                    db
                },
                None,
            )
            .await?;

        let options = ReplicationOptions::default()
            .create_target()
            .via_hub(bridged);
        let result = secondary
            .replicate_from(&ctx.remote_test_db, &options)
            .await;
        chain
            .fail_or_continue(
                Step::ReplicateRemoteToLocalCopy,
                result,
                Step::EnumerateLocalDocs,
            )
            .await?;

        Ok(secondary)
    }

    /// Check that every document of the primary store made it into the copy
    async fn verify<Ch: ReportChannel>(
        &self,
        chain: &Chain<'_, Ch>,
        ctx: &mut RunContext<C>,
        primary: &Database<C>,
        secondary: &Database<C>,
    ) -> Result<(), Halt> {
        self.scheduler.after(self.config.settle).await;

        let result = primary.all_docs(AllDocsOptions::with_docs()).await;
        chain
            .handle_then_continue(
                Step::EnumerateLocalDocs,
                result,
                "queue_local_docs",
                |rows| ctx.queue_for_verification(rows),
                Some(Step::VerifyEach),
            )
            .await?;

        while let Some(id) = ctx.pending.front().map(|row| row.id.clone()) {
            let result = secondary.get(&id).await;
            chain
                .handle_then_continue(
                    Step::VerifyEach,
                    result,
                    "mark_doc_completed",
                    |_doc| ctx.verified += 1,
                    None,
                )
                .await?;
            chain.log("A doc has completed.").await?;

            ctx.pending.pop_front();
            if !ctx.pending.is_empty() {
                chain.announce(Step::VerifyEach).await?;
            }
        }

        tracing::debug!(
            verified = ctx.verified,
            mode = %ctx.mode,
            "every local document found in the copy"
        );
        Ok(())
    }
}

fn seed_doc(name: &str) -> Document {
    Document::with_id(name).field("foo", name)
}
