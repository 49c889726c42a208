use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "t_character")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    // nullable: survives deletion of its owner
    pub owner_id: Option<i32>,
    pub name: String,
    pub persona: String,
    pub img: Option<String>,
    pub is_public: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
