// ============================================================================
// 教室与实验室数据访问模块
// ============================================================================
// 本模块提供教室（classroom）与实验室（lab_room）的数据库操作接口
//
// 功能：
// - 教室的 CRUD 操作（理论课、习题课、研讨课使用）
// - 实验室的 CRUD 操作（实验课使用，带实验类型标签）
// - 在用资源计数（统计模块使用）
// ============================================================================

use serde::{Deserialize, Serialize};
use sqlx::{Error as SqlxError, FromRow, SqlitePool};
use tracing::{debug, error, info, warn};

/// 教室信息
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Classroom {
    /// 教室 ID
    pub id: i64,
    /// 房间号（全局唯一）
    pub room_number: String,
    /// 容量
    pub capacity: i64,
    /// 楼栋
    pub building: Option<String>,
    /// 是否可用
    pub is_active: i64,
    /// 创建时间
    pub created_at: String,
}

/// 创建教室的输入数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClassroomInput {
    /// 房间号
    pub room_number: String,
    /// 容量
    pub capacity: i64,
    /// 楼栋
    pub building: Option<String>,
}

/// 实验室信息
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LabRoom {
    /// 实验室 ID
    pub id: i64,
    /// 房间号（全局唯一）
    pub room_number: String,
    /// 实验类型标签（如 DSA Lab、CN Lab）
    pub lab_type: String,
    /// 容量
    pub capacity: i64,
    /// 楼栋
    pub building: Option<String>,
    /// 是否可用
    pub is_active: i64,
    /// 创建时间
    pub created_at: String,
}

/// 创建实验室的输入数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLabRoomInput {
    /// 房间号
    pub room_number: String,
    /// 实验类型标签
    pub lab_type: String,
    /// 容量
    pub capacity: i64,
    /// 楼栋
    pub building: Option<String>,
}

/// 教室数据访问接口
pub struct ClassroomRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ClassroomRepository<'a> {
    /// 创建新的教室数据访问实例
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建教室
    ///
    /// # 参数
    /// - `input`: 创建教室的输入数据
    ///
    /// # 返回
    /// - `Ok(Classroom)`: 创建成功
    /// - `Err(SqlxError)`: 创建失败（如容量非正或房间号重复）
    pub async fn create(&self, input: CreateClassroomInput) -> Result<Classroom, SqlxError> {
        info!("创建教室: {}", input.room_number);

        // 容量必须大于 0
        if input.capacity <= 0 {
            error!("教室容量必须大于0，当前值: {}", input.capacity);
            return Err(SqlxError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "教室容量必须大于0",
            )));
        }

        let result = sqlx::query_as::<_, Classroom>(
            r#"
            INSERT INTO classrooms (room_number, capacity, building, is_active, created_at)
            VALUES (?, ?, ?, 1, datetime('now'))
            RETURNING id, room_number, capacity, building, is_active, created_at
            "#,
        )
        .bind(&input.room_number)
        .bind(input.capacity)
        .bind(&input.building)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            error!("创建教室失败: {}", e);
            e
        })?;

        info!("教室创建成功，ID: {}", result.id);
        Ok(result)
    }

    /// 根据 ID 查询教室
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Classroom>, SqlxError> {
        debug!("查询教室，ID: {}", id);

        sqlx::query_as::<_, Classroom>(
            r#"
            SELECT id, room_number, capacity, building, is_active, created_at
            FROM classrooms
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
    }

    /// 根据房间号查询教室
    pub async fn find_by_room_number(
        &self,
        room_number: &str,
    ) -> Result<Option<Classroom>, SqlxError> {
        debug!("按房间号查询教室: {}", room_number);

        sqlx::query_as::<_, Classroom>(
            r#"
            SELECT id, room_number, capacity, building, is_active, created_at
            FROM classrooms
            WHERE room_number = ?
            "#,
        )
        .bind(room_number)
        .fetch_optional(self.pool)
        .await
    }

    /// 查询所有教室
    pub async fn find_all(&self) -> Result<Vec<Classroom>, SqlxError> {
        debug!("查询所有教室");

        let result = sqlx::query_as::<_, Classroom>(
            r#"
            SELECT id, room_number, capacity, building, is_active, created_at
            FROM classrooms
            ORDER BY room_number
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        info!("查询到 {} 间教室", result.len());
        Ok(result)
    }

    /// 查询可用教室数量
    pub async fn count_active(&self) -> Result<i64, SqlxError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM classrooms WHERE is_active = 1")
            .fetch_one(self.pool)
            .await?;
        Ok(row.0)
    }

    /// 按房间号查找教室，不存在时以默认容量创建
    pub async fn get_or_create(&self, room_number: &str) -> Result<Classroom, SqlxError> {
        if let Some(room) = self.find_by_room_number(room_number).await? {
            return Ok(room);
        }

        debug!("教室 {} 不存在，自动创建", room_number);
        self.create(CreateClassroomInput {
            room_number: room_number.to_string(),
            capacity: 60,
            building: None,
        })
        .await
    }

    /// 删除教室
    pub async fn delete(&self, id: i64) -> Result<(), SqlxError> {
        info!("删除教室，ID: {}", id);

        let result = sqlx::query("DELETE FROM classrooms WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!("教室不存在，ID: {}", id);
            return Err(SqlxError::RowNotFound);
        }

        Ok(())
    }
}

/// 实验室数据访问接口
pub struct LabRoomRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LabRoomRepository<'a> {
    /// 创建新的实验室数据访问实例
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建实验室
    ///
    /// # 参数
    /// - `input`: 创建实验室的输入数据
    ///
    /// # 返回
    /// - `Ok(LabRoom)`: 创建成功
    /// - `Err(SqlxError)`: 创建失败
    pub async fn create(&self, input: CreateLabRoomInput) -> Result<LabRoom, SqlxError> {
        info!("创建实验室: {} ({})", input.room_number, input.lab_type);

        if input.capacity <= 0 {
            error!("实验室容量必须大于0，当前值: {}", input.capacity);
            return Err(SqlxError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "实验室容量必须大于0",
            )));
        }

        let result = sqlx::query_as::<_, LabRoom>(
            r#"
            INSERT INTO lab_rooms (room_number, lab_type, capacity, building, is_active, created_at)
            VALUES (?, ?, ?, ?, 1, datetime('now'))
            RETURNING id, room_number, lab_type, capacity, building, is_active, created_at
            "#,
        )
        .bind(&input.room_number)
        .bind(&input.lab_type)
        .bind(input.capacity)
        .bind(&input.building)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            error!("创建实验室失败: {}", e);
            e
        })?;

        info!("实验室创建成功，ID: {}", result.id);
        Ok(result)
    }

    /// 根据 ID 查询实验室
    pub async fn find_by_id(&self, id: i64) -> Result<Option<LabRoom>, SqlxError> {
        debug!("查询实验室，ID: {}", id);

        sqlx::query_as::<_, LabRoom>(
            r#"
            SELECT id, room_number, lab_type, capacity, building, is_active, created_at
            FROM lab_rooms
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
    }

    /// 根据房间号查询实验室
    pub async fn find_by_room_number(
        &self,
        room_number: &str,
    ) -> Result<Option<LabRoom>, SqlxError> {
        debug!("按房间号查询实验室: {}", room_number);

        sqlx::query_as::<_, LabRoom>(
            r#"
            SELECT id, room_number, lab_type, capacity, building, is_active, created_at
            FROM lab_rooms
            WHERE room_number = ?
            "#,
        )
        .bind(room_number)
        .fetch_optional(self.pool)
        .await
    }

    /// 查询所有实验室
    pub async fn find_all(&self) -> Result<Vec<LabRoom>, SqlxError> {
        debug!("查询所有实验室");

        let result = sqlx::query_as::<_, LabRoom>(
            r#"
            SELECT id, room_number, lab_type, capacity, building, is_active, created_at
            FROM lab_rooms
            ORDER BY room_number
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        info!("查询到 {} 间实验室", result.len());
        Ok(result)
    }

    /// 查询可用实验室数量
    pub async fn count_active(&self) -> Result<i64, SqlxError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM lab_rooms WHERE is_active = 1")
            .fetch_one(self.pool)
            .await?;
        Ok(row.0)
    }

    /// 按房间号查找实验室，不存在时创建
    pub async fn get_or_create(
        &self,
        room_number: &str,
        lab_type: &str,
    ) -> Result<LabRoom, SqlxError> {
        if let Some(room) = self.find_by_room_number(room_number).await? {
            return Ok(room);
        }

        debug!("实验室 {} 不存在，自动创建", room_number);
        self.create(CreateLabRoomInput {
            room_number: room_number.to_string(),
            lab_type: lab_type.to_string(),
            capacity: 30,
            building: None,
        })
        .await
    }

    /// 删除实验室
    pub async fn delete(&self, id: i64) -> Result<(), SqlxError> {
        info!("删除实验室，ID: {}", id);

        let result = sqlx::query("DELETE FROM lab_rooms WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!("实验室不存在，ID: {}", id);
            return Err(SqlxError::RowNotFound);
        }

        Ok(())
    }
}
