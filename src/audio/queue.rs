use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{GuildId, UserId};
use std::{collections::VecDeque, sync::Arc};
use tracing::info;

/// Una canción ya resuelta, lista para reproducirse.
///
/// `title` es solo para mostrar al usuario; `stream_url` es el handle
/// opaco que la sesión de voz sabe reproducir. Inmutable una vez creada.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEntry {
    pub title: String,
    pub stream_url: String,
    pub requested_by: UserId,
    #[allow(dead_code)]
    pub added_at: DateTime<Utc>,
}

impl TrackEntry {
    pub fn new(title: impl Into<String>, stream_url: impl Into<String>, requested_by: UserId) -> Self {
        Self {
            title: title.into(),
            stream_url: stream_url.into(),
            requested_by,
            added_at: Utc::now(),
        }
    }
}

/// Colas de reproducción por guild.
///
/// Una cola por guild, creada de forma perezosa y nunca eliminada (una cola
/// vacía es un estado estable y barato). Las mutaciones de cada cola van
/// bajo su propio mutex no-async: append y pop-front nunca se intercalan
/// entre comandos concurrentes, y una guild jamás bloquea a otra.
#[derive(Debug)]
pub struct QueueStore {
    queues: DashMap<GuildId, Arc<Mutex<VecDeque<TrackEntry>>>>,
    max_size: usize,
}

impl QueueStore {
    pub fn new(max_size: usize) -> Self {
        Self {
            queues: DashMap::new(),
            max_size,
        }
    }

    /// Garantiza que exista una cola para la guild. Idempotente.
    pub fn ensure(&self, guild_id: GuildId) {
        self.queue(guild_id);
    }

    /// Agrega entradas al final de la cola preservando su orden relativo.
    ///
    /// Devuelve cuántas fueron aceptadas (la cola tiene capacidad máxima).
    pub fn enqueue(&self, guild_id: GuildId, entries: Vec<TrackEntry>) -> usize {
        let queue = self.queue(guild_id);
        let mut q = queue.lock();

        let available = self.max_size.saturating_sub(q.len());
        let accepted = entries.len().min(available);

        for entry in entries.into_iter().take(accepted) {
            q.push_back(entry);
        }

        if accepted > 0 {
            info!("➕ {} canción(es) agregadas a la cola de guild {}", accepted, guild_id);
        }
        accepted
    }

    /// Saca y devuelve la primera entrada, o `None` si la cola está vacía.
    pub fn pop_front(&self, guild_id: GuildId) -> Option<TrackEntry> {
        let queue = self.queue(guild_id);
        let mut q = queue.lock();
        q.pop_front()
    }

    /// Cantidad de entradas pendientes.
    pub fn len(&self, guild_id: GuildId) -> usize {
        match self.queues.get(&guild_id) {
            Some(queue) => queue.lock().len(),
            None => 0,
        }
    }

    /// Copia de las primeras `limit` entradas, para mostrar la cola.
    pub fn peek(&self, guild_id: GuildId, limit: usize) -> Vec<TrackEntry> {
        match self.queues.get(&guild_id) {
            Some(queue) => queue.lock().iter().take(limit).cloned().collect(),
            None => Vec::new(),
        }
    }

    fn queue(&self, guild_id: GuildId) -> Arc<Mutex<VecDeque<TrackEntry>>> {
        self.queues
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(title: &str) -> TrackEntry {
        TrackEntry::new(title, format!("https://cdn.example/{title}"), UserId::new(1))
    }

    #[test]
    fn test_fifo_order() {
        let store = QueueStore::new(100);
        let guild = GuildId::new(10);

        store.enqueue(guild, vec![entry("a"), entry("b")]);
        store.enqueue(guild, vec![entry("c")]);

        assert_eq!(store.pop_front(guild).unwrap().title, "a");
        assert_eq!(store.pop_front(guild).unwrap().title, "b");
        assert_eq!(store.pop_front(guild).unwrap().title, "c");
        assert_eq!(store.pop_front(guild), None);
    }

    #[test]
    fn test_lazy_creation_and_len() {
        let store = QueueStore::new(100);
        let guild = GuildId::new(11);

        assert_eq!(store.len(guild), 0);
        store.ensure(guild);
        assert_eq!(store.len(guild), 0);

        store.enqueue(guild, vec![entry("a")]);
        assert_eq!(store.len(guild), 1);
    }

    #[test]
    fn test_max_size_cap() {
        let store = QueueStore::new(2);
        let guild = GuildId::new(12);

        let accepted = store.enqueue(guild, vec![entry("a"), entry("b"), entry("c")]);
        assert_eq!(accepted, 2);
        assert_eq!(store.len(guild), 2);

        assert_eq!(store.enqueue(guild, vec![entry("d")]), 0);
    }

    #[test]
    fn test_guild_isolation() {
        let store = Arc::new(QueueStore::new(1000));
        let g1 = GuildId::new(20);
        let g2 = GuildId::new(21);

        std::thread::scope(|s| {
            let a = Arc::clone(&store);
            let b = Arc::clone(&store);
            s.spawn(move || {
                for i in 0..200 {
                    a.enqueue(g1, vec![entry(&format!("g1-{i}"))]);
                }
            });
            s.spawn(move || {
                for i in 0..200 {
                    b.enqueue(g2, vec![entry(&format!("g2-{i}"))]);
                }
            });
        });

        assert_eq!(store.len(g1), 200);
        assert_eq!(store.len(g2), 200);

        // cada cola conserva su propio orden de inserción
        for i in 0..200 {
            assert_eq!(store.pop_front(g1).unwrap().title, format!("g1-{i}"));
        }
    }

    #[test]
    fn test_peek_does_not_consume() {
        let store = QueueStore::new(100);
        let guild = GuildId::new(13);

        store.enqueue(guild, vec![entry("a"), entry("b"), entry("c")]);
        let head = store.peek(guild, 2);

        assert_eq!(head.len(), 2);
        assert_eq!(head[0].title, "a");
        assert_eq!(store.len(guild), 3);
    }
}
