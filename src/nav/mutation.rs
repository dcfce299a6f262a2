//! Confirmed remote edits: rotation, drop and caption changes.
//!
//! A mutation is planned from the current selection, sent to the server, and
//! only applied to the tree once the server accepts it.

use super::alias::sync_aliases;
use super::cursor::Navigator;
use super::row::Row;
use crate::api::{Backend, IndexAction, Rotation};
use crate::error::{ApiError, NavError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Rotate {
        /// Row path in the tree.
        path: String,
        index_file: String,
        item: String,
        rotation: Rotation,
    },
    Drop {
        path: String,
        index_file: String,
        item: String,
    },
    Caption {
        path: String,
        text_path: String,
        text: String,
    },
}

impl Mutation {
    /// Row path the mutation applies to.
    pub fn path(&self) -> &str {
        match self {
            Mutation::Rotate { path, .. }
            | Mutation::Drop { path, .. }
            | Mutation::Caption { path, .. } => path,
        }
    }

    /// Short label for status messages.
    pub fn describe(&self) -> String {
        match self {
            Mutation::Rotate { item, rotation, .. } => {
                format!("rotate {} {}", item, rotation.as_str())
            }
            Mutation::Drop { item, index_file, .. } => {
                format!("drop {} from {}", item, index_file)
            }
            Mutation::Caption { text_path, .. } => format!("save {}", text_path),
        }
    }

    /// Swap in new caption text. Other mutations are returned unchanged.
    pub fn with_text(self, new_text: String) -> Mutation {
        match self {
            Mutation::Caption {
                path, text_path, ..
            } => Mutation::Caption {
                path,
                text_path,
                text: new_text,
            },
            other => other,
        }
    }

    /// Ask the server to perform this mutation.
    pub async fn send(&self, backend: &dyn Backend) -> Result<(), ApiError> {
        match self {
            Mutation::Rotate {
                index_file,
                item,
                rotation,
                ..
            } => {
                backend
                    .update_index(index_file, item, IndexAction::Rotate(*rotation))
                    .await
            }
            Mutation::Drop {
                index_file, item, ..
            } => backend.update_index(index_file, item, IndexAction::Drop).await,
            Mutation::Caption {
                text_path, text, ..
            } => backend.put_text(text_path, text).await,
        }
    }
}

impl Navigator {
    /// Rotate the selected file through its default index.
    pub fn plan_rotate(&self, rotation: Rotation) -> Result<Mutation, NavError> {
        let row = self.selected_file()?;
        let (index_file, item) = row.default_index_target();
        Ok(Mutation::Rotate {
            path: row.path.clone(),
            index_file,
            item,
            rotation,
        })
    }

    /// Drop the selected file from the index it was listed from.
    pub fn plan_drop(&self) -> Result<Mutation, NavError> {
        let row = self.selected_file()?;
        let (index_file, item) = row.own_index_target();
        Ok(Mutation::Drop {
            path: row.path.clone(),
            index_file,
            item,
        })
    }

    /// Caption edit for the selected image or its folder, carrying the
    /// current text until [`Mutation::with_text`] replaces it.
    pub fn plan_caption(&self, folder: bool) -> Result<Mutation, NavError> {
        let target = self.caption_target(folder)?;
        Ok(Mutation::Caption {
            path: target.path,
            text_path: target.text_path,
            text: target.text,
        })
    }

    /// Apply a mutation the server has accepted.
    pub fn apply(&mut self, mutation: &Mutation) -> Result<(), NavError> {
        let path = mutation.path();
        let index = self
            .store()
            .find_by_path(path)
            .ok_or_else(|| NavError::NotFound(path.to_string()))?;
        let id = self
            .store()
            .id_at(index)
            .ok_or_else(|| NavError::NotFound(path.to_string()))?;

        let touched = match mutation {
            Mutation::Rotate { .. } => {
                if let Some(row) = self.store_mut().get_mut(id) {
                    row.version += 1;
                }
                let mut touched = sync_aliases(self.store_mut(), id);
                touched.push(id);
                touched
            }
            Mutation::Caption { text, .. } => {
                if let Some(row) = self.store_mut().get_mut(id) {
                    row.set_text(text);
                }
                let mut touched = sync_aliases(self.store_mut(), id);
                touched.push(id);
                touched
            }
            Mutation::Drop { .. } => {
                let aliases = self.store().aliases_of(id);
                let version = self.store().get(id).map(|r| r.version + 1).unwrap_or(1);
                for alias in &aliases {
                    if let Some(row) = self.store_mut().get_mut(*alias) {
                        row.version = version;
                    }
                }
                let was_selected = self.selected_id() == Some(id);
                self.store_mut().remove(id);
                if was_selected {
                    self.reselect_near(index);
                }
                aliases
            }
        };
        tracing::info!(mutation = %mutation.describe(), "applied");

        if self.selected_id().is_some_and(|sel| touched.contains(&sel)) {
            self.refresh_image();
        }
        Ok(())
    }

    /// Send a mutation and apply it once confirmed.
    #[cfg(test)]
    pub async fn mutate_with(
        &mut self,
        backend: &dyn Backend,
        mutation: Mutation,
    ) -> crate::error::Result<()> {
        if let Err(err) = mutation.send(backend).await {
            tracing::error!(mutation = %mutation.describe(), %err, "mutation rejected");
            return Err(err.into());
        }
        self.apply(&mutation)?;
        Ok(())
    }

    fn selected_file(&self) -> Result<&Row, NavError> {
        let row = self.selected_row().ok_or(NavError::NoSelection)?;
        if !row.is_file() {
            return Err(NavError::NotAFile(row.path.clone()));
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{dir, file, indexed, Call, FakeBackend};
    use crate::nav::cursor::NavEvent;
    use crate::nav::preload::PreloadScheduler;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    /// `/2019/{a,b}.jpg` plus `/best.mpr` listing `a.jpg` again.
    fn backend() -> FakeBackend {
        FakeBackend::new()
            .with_dir("", vec![dir("2019"), dir("best.mpr")])
            .with_dir("/2019", vec![file("a.jpg"), file("b.jpg")])
            .with_dir(
                "/best.mpr",
                vec![indexed("a.jpg", "/best.mpr", "2019/a.jpg", "/2019/a.jpg")],
            )
    }

    async fn opened(backend: &FakeBackend) -> (Navigator, UnboundedReceiver<NavEvent>) {
        let (tx, rx) = unbounded_channel();
        let mut nav = Navigator::new(PreloadScheduler::new(1, 3), tx);
        let step = nav.start();
        nav.drive(backend, step).await;
        for path in ["/best.mpr/a.jpg", "/2019/a.jpg"] {
            let step = nav.open_path(path).unwrap();
            nav.drive(backend, step).await;
        }
        (nav, rx)
    }

    fn row<'a>(nav: &'a Navigator, path: &str) -> &'a Row {
        let i = nav.store().find_by_path(path).unwrap();
        nav.store().row_at(i).unwrap()
    }

    #[tokio::test]
    async fn rotate_targets_default_index_and_bumps_aliases() {
        let backend = backend();
        let (mut nav, _rx) = opened(&backend).await;
        let m = nav.plan_rotate(Rotation::Right).unwrap();
        assert_eq!(
            m,
            Mutation::Rotate {
                path: "/2019/a.jpg".into(),
                index_file: "/2019/index.mpr".into(),
                item: "a.jpg".into(),
                rotation: Rotation::Right,
            }
        );
        nav.mutate_with(&backend, m).await.unwrap();
        assert_eq!(row(&nav, "/2019/a.jpg").version, 1);
        assert_eq!(row(&nav, "/best.mpr/a.jpg").version, 1);
        assert_eq!(row(&nav, "/2019/b.jpg").version, 0);
        assert_eq!(nav.image().unwrap().version, 1);
        assert!(nav.image().unwrap().url.ends_with("?_=1"));
        assert!(backend.calls().contains(&Call::UpdateIndex(
            "/2019/index.mpr".into(),
            "a.jpg".into(),
            IndexAction::Rotate(Rotation::Right),
        )));
    }

    #[tokio::test]
    async fn rotating_alias_refreshes_selected_original() {
        let backend = backend();
        let (mut nav, mut rx) = opened(&backend).await;
        let m = Mutation::Rotate {
            path: "/best.mpr/a.jpg".into(),
            index_file: "/2019/index.mpr".into(),
            item: "a.jpg".into(),
            rotation: Rotation::Flip,
        };
        while rx.try_recv().is_ok() {}
        nav.apply(&m).unwrap();
        assert_eq!(nav.selected_row().unwrap().path, "/2019/a.jpg");
        assert_eq!(nav.image().unwrap().version, 1);
        assert_eq!(rx.try_recv().unwrap(), NavEvent::ImageChanged);
    }

    #[tokio::test]
    async fn caption_updates_row_and_aliases() {
        let backend = backend();
        let (mut nav, _rx) = opened(&backend).await;
        let planned = nav.plan_caption(false).unwrap();
        assert_eq!(
            planned,
            Mutation::Caption {
                path: "/2019/a.jpg".into(),
                text_path: "/2019/a.txt".into(),
                text: String::new(),
            }
        );
        let m = planned.with_text("!hide\nBeach".into());
        nav.mutate_with(&backend, m).await.unwrap();
        assert_eq!(row(&nav, "/best.mpr/a.jpg").text, "!hide\nBeach");
        assert_eq!(row(&nav, "/best.mpr/a.jpg").text_without_flags, "Beach");
        assert_eq!(nav.image().unwrap().caption, "Beach");

        let folder = nav.plan_caption(true).unwrap().with_text("Trip".into());
        nav.mutate_with(&backend, folder).await.unwrap();
        assert_eq!(row(&nav, "/2019").text, "Trip");
        assert!(backend
            .calls()
            .contains(&Call::PutText("/2019/summary.txt".into(), "Trip".into())));
    }

    #[test]
    fn with_text_only_touches_captions() {
        let rotate = Mutation::Rotate {
            path: "/a.jpg".into(),
            index_file: "/index.mpr".into(),
            item: "a.jpg".into(),
            rotation: Rotation::Right,
        };
        assert_eq!(rotate.clone().with_text("x".into()), rotate);
    }

    #[tokio::test]
    async fn drop_uses_own_index_and_moves_selection() {
        let backend = backend();
        let (mut nav, _rx) = opened(&backend).await;
        let step = nav.open_path("/best.mpr/a.jpg").unwrap();
        nav.drive(&backend, step).await;
        let m = nav.plan_drop().unwrap();
        assert_eq!(
            m,
            Mutation::Drop {
                path: "/best.mpr/a.jpg".into(),
                index_file: "/best.mpr".into(),
                item: "2019/a.jpg".into(),
            }
        );
        nav.mutate_with(&backend, m).await.unwrap();
        assert!(nav.store().find_by_path("/best.mpr/a.jpg").is_none());
        assert_eq!(row(&nav, "/2019/a.jpg").version, 1);
        // It was the last row; the selection falls back onto its folder.
        assert_eq!(nav.selected_row().unwrap().path, "/best.mpr");
    }

    #[tokio::test]
    async fn drop_selects_following_row() {
        let backend = backend();
        let (mut nav, _rx) = opened(&backend).await;
        let m = nav.plan_drop().unwrap();
        nav.mutate_with(&backend, m).await.unwrap();
        assert_eq!(nav.selected_row().unwrap().path, "/2019/b.jpg");
        assert_eq!(nav.image().unwrap().path, "/2019/b.jpg");
    }

    #[tokio::test]
    async fn rejected_mutation_leaves_rows_alone() {
        let backend = backend().failing_mutations(ApiError::from_status(500, "disk full"));
        let (mut nav, _rx) = opened(&backend).await;
        let m = nav.plan_rotate(Rotation::Left).unwrap();
        let err = nav.mutate_with(&backend, m).await.unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert_eq!(row(&nav, "/2019/a.jpg").version, 0);
        assert_eq!(row(&nav, "/best.mpr/a.jpg").version, 0);

        let m = nav.plan_drop().unwrap();
        assert!(nav.mutate_with(&backend, m).await.is_err());
        assert!(nav.store().find_by_path("/2019/a.jpg").is_some());
    }

    #[tokio::test]
    async fn planning_needs_a_selected_file() {
        let backend = backend();
        let (mut nav, _rx) = opened(&backend).await;
        nav.select_at(0).unwrap();
        assert_eq!(
            nav.plan_rotate(Rotation::Right),
            Err(NavError::NotAFile("/2019".into()))
        );
        nav.clear_selection();
        assert_eq!(nav.plan_drop(), Err(NavError::NoSelection));
    }

    #[tokio::test]
    async fn apply_to_vanished_row_is_not_found() {
        let backend = backend();
        let (mut nav, _rx) = opened(&backend).await;
        let m = nav.plan_rotate(Rotation::Right).unwrap();
        nav.select_at(0).unwrap();
        let _ = nav.toggle_current();
        assert_eq!(
            nav.apply(&m),
            Err(NavError::NotFound("/2019/a.jpg".into()))
        );
    }
}
